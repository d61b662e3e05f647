use axum::Router;

use proventory_parties::PartyKind;

use crate::app::routes::parties::{self, PartyScreen};
use crate::authz::perms;

pub struct Customers;

impl PartyScreen for Customers {
    const KIND: PartyKind = PartyKind::Customer;
    const READ: &'static str = perms::CUSTOMERS_READ;
    const WRITE: &'static str = perms::CUSTOMERS_WRITE;
}

pub fn router() -> Router {
    parties::router::<Customers>()
}
