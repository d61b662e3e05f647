use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use proventory_core::TenantId;
use proventory_infra::{Backend, ChangeFeed, InMemoryBackend, Query};
use serde_json::json;

fn seeded(rows: usize, tenant_id: TenantId, rt: &tokio::runtime::Runtime) -> InMemoryBackend {
    let backend = InMemoryBackend::new(ChangeFeed::new(16));
    rt.block_on(async {
        for i in 0..rows {
            let row = json!({
                "id": i.to_string(),
                "sku": format!("SKU-{i:05}"),
                "active": i % 3 != 0,
                "quantity": (i * 7) % 50,
            });
            let _ = backend.insert(tenant_id, "items", row).await;
        }
    });
    backend
}

fn bench_select(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    let tenant_id = TenantId::new();
    let query = Query::new().eq("active", true).order_desc("quantity").limit(50);

    let mut group = c.benchmark_group("memory_backend_select");
    for rows in [100usize, 1_000, 10_000] {
        let backend = seeded(rows, tenant_id, &rt);
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &backend, |b, backend| {
            b.iter(|| rt.block_on(backend.select(tenant_id, "items", black_box(&query))))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_select);
criterion_main!(benches);
