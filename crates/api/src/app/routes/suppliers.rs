use axum::Router;

use proventory_parties::PartyKind;

use crate::app::routes::parties::{self, PartyScreen};
use crate::authz::perms;

pub struct Suppliers;

impl PartyScreen for Suppliers {
    const KIND: PartyKind = PartyKind::Supplier;
    const READ: &'static str = perms::SUPPLIERS_READ;
    const WRITE: &'static str = perms::SUPPLIERS_WRITE;
}

pub fn router() -> Router {
    parties::router::<Suppliers>()
}
