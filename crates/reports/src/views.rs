//! Tables for the exportable screens.

use std::collections::HashMap;
use std::str::FromStr;

use proventory_core::DomainError;
use proventory_inventory::{Item, StockStatus};
use proventory_parties::{Party, PartyId, PartyKind, PartyStatus};
use proventory_purchasing::{PurchaseOrder, PurchaseOrderStatus};

use crate::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportView {
    Items,
    Suppliers,
    Customers,
    PurchaseOrders,
}

impl ReportView {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportView::Items => "items",
            ReportView::Suppliers => "suppliers",
            ReportView::Customers => "customers",
            ReportView::PurchaseOrders => "purchase-orders",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReportView::Items => "Inventory Items",
            ReportView::Suppliers => "Suppliers",
            ReportView::Customers => "Customers",
            ReportView::PurchaseOrders => "Purchase Orders",
        }
    }
}

impl FromStr for ReportView {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_end_matches(".csv") {
            "items" => Ok(Self::Items),
            "suppliers" => Ok(Self::Suppliers),
            "customers" => Ok(Self::Customers),
            "purchase-orders" | "purchase_orders" => Ok(Self::PurchaseOrders),
            _ => Err(DomainError::not_found()),
        }
    }
}

/// Minor units to a two-decimal string.
pub fn format_money(minor: u64) -> String {
    format!("{}.{:02}", minor / 100, minor % 100)
}

fn stock_label(status: StockStatus) -> &'static str {
    match status {
        StockStatus::OutOfStock => "Out of stock",
        StockStatus::Low => "Low",
        StockStatus::InStock => "In stock",
    }
}

fn order_status_label(status: PurchaseOrderStatus) -> &'static str {
    match status {
        PurchaseOrderStatus::Draft => "Draft",
        PurchaseOrderStatus::PendingApproval => "Pending approval",
        PurchaseOrderStatus::Approved => "Approved",
        PurchaseOrderStatus::Rejected => "Rejected",
        PurchaseOrderStatus::Issued => "Issued",
        PurchaseOrderStatus::Received => "Received",
        PurchaseOrderStatus::Cancelled => "Cancelled",
    }
}

pub fn items_table(items: &[Item]) -> Table {
    let mut table = Table::new([
        "SKU", "Name", "Unit", "Quantity", "Reorder level", "Unit cost", "Stock value", "Status", "Active",
    ]);
    for item in items {
        table.push_row([
            item.sku.clone(),
            item.name.clone(),
            item.unit.clone(),
            item.quantity.to_string(),
            item.reorder_level.to_string(),
            format_money(item.unit_cost),
            format_money(item.stock_value()),
            stock_label(item.stock_status()).to_string(),
            if item.active { "yes" } else { "no" }.to_string(),
        ]);
    }
    table
}

/// Parties of one kind; others in the slice are skipped.
pub fn parties_table(kind: PartyKind, parties: &[Party]) -> Table {
    let mut table = Table::new(["Name", "Email", "Phone", "Address", "Status"]);
    for p in parties.iter().filter(|p| p.kind == kind) {
        table.push_row([
            p.name.clone(),
            p.contact.email.clone().unwrap_or_default(),
            p.contact.phone.clone().unwrap_or_default(),
            p.contact.address.clone().unwrap_or_default(),
            match p.status {
                PartyStatus::Active => "Active".to_string(),
                PartyStatus::Suspended => "Suspended".to_string(),
            },
        ]);
    }
    table
}

pub fn orders_table(orders: &[PurchaseOrder], suppliers: &[Party]) -> Table {
    let names: HashMap<PartyId, &str> = suppliers.iter().map(|s| (s.id, s.name.as_str())).collect();
    let mut table = Table::new(["PO number", "Supplier", "Status", "Lines", "Total", "Expected", "Created"]);
    for po in orders {
        table.push_row([
            po.po_number.clone(),
            names.get(&po.supplier_id).copied().unwrap_or("(unknown)").to_string(),
            order_status_label(po.status).to_string(),
            po.lines.len().to_string(),
            format_money(po.total()),
            po.expected_date.map(|d| d.to_string()).unwrap_or_default(),
            po.created_at.format("%Y-%m-%d").to_string(),
        ]);
    }
    table
}

/// Summary lines printed under the item table.
pub fn items_summary(items: &[Item]) -> Vec<String> {
    let value: u64 = items.iter().map(Item::stock_value).sum();
    let low = proventory_inventory::low_stock(items).len();
    vec![
        format!("Items: {}", items.len()),
        format!("Total stock value: {}", format_money(value)),
        format!("Needing reorder: {low}"),
    ]
}
