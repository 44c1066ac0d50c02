use serde::{Deserialize, Serialize};

use super::product::ProductId;

/// A paid order as handed over by the payment flow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedOrder {
    pub order_id: String,
    /// One entry per order line, in line order.
    pub product_ids: Vec<ProductId>,
}
