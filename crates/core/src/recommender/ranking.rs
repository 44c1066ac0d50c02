use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::store::ScoredMember;
use crate::domain::product::{Product, ProductId};

/// A suggested product id with its combined affinity score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedProduct {
    pub product_id: ProductId,
    pub score: f64,
}

/// Ascending id order used to break score ties. Ids that both parse as unsigned
/// integers compare numerically so `9` sorts before `10`.
pub fn compare_product_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(left), Ok(right)) => left.cmp(&right).then_with(|| a.cmp(b)),
        _ => a.cmp(b),
    }
}

/// Input ids with repeats removed, first occurrence kept.
pub fn distinct_ids(ids: &[ProductId]) -> Vec<ProductId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().filter(|id| seen.insert(*id)).cloned().collect()
}

/// Orders store entries by non-increasing score then ascending id, drops the
/// excluded ids and keeps the first `limit`.
pub fn rank_entries(
    entries: Vec<ScoredMember>,
    exclude: &[ProductId],
    limit: usize,
) -> Vec<RankedProduct> {
    let excluded: HashSet<&str> = exclude.iter().map(ProductId::as_str).collect();

    let mut ranked = entries
        .into_iter()
        .filter(|(member, _)| !excluded.contains(member.as_str()))
        .collect::<Vec<_>>();

    ranked.sort_by(|(a_id, a_score), (b_id, b_score)| {
        b_score.total_cmp(a_score).then_with(|| compare_product_ids(a_id, b_id))
    });
    ranked.truncate(limit);

    ranked
        .into_iter()
        .map(|(member, score)| RankedProduct { product_id: ProductId(member), score })
        .collect()
}

/// Re-applies the rank order to an unordered catalog result. Ids the catalog did
/// not return are skipped.
pub fn order_by_rank(ranked: &[RankedProduct], resolved: Vec<Product>) -> Vec<Product> {
    let mut by_id: HashMap<ProductId, Product> =
        resolved.into_iter().map(|product| (product.id.clone(), product)).collect();

    ranked.iter().filter_map(|entry| by_id.remove(&entry.product_id)).collect()
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use rust_decimal::Decimal;

    use super::{compare_product_ids, distinct_ids, order_by_rank, rank_entries, RankedProduct};
    use crate::domain::product::{Product, ProductId};

    fn product(id: &str) -> Product {
        Product {
            id: ProductId::from(id),
            name: format!("Product {id}"),
            slug: format!("product-{id}"),
            price: Decimal::new(1999, 2),
            available: true,
        }
    }

    fn entries(pairs: &[(&str, f64)]) -> Vec<(String, f64)> {
        pairs.iter().map(|(member, score)| (member.to_string(), *score)).collect()
    }

    #[test]
    fn numeric_ids_compare_numerically() {
        assert_eq!(compare_product_ids("9", "10"), Ordering::Less);
        assert_eq!(compare_product_ids("10", "9"), Ordering::Greater);
        assert_eq!(compare_product_ids("abc", "abd"), Ordering::Less);
        assert_eq!(compare_product_ids("10", "abc"), Ordering::Less);
        assert_eq!(compare_product_ids("007", "7"), Ordering::Less);
    }

    #[test]
    fn ties_break_on_ascending_id_regardless_of_store_order() {
        let ranked =
            rank_entries(entries(&[("4", 1.0), ("2", 2.0), ("3", 1.0), ("10", 1.0)]), &[], 10);
        let ids: Vec<&str> = ranked.iter().map(|entry| entry.product_id.as_str()).collect();

        assert_eq!(ids, vec!["2", "3", "4", "10"]);
    }

    #[test]
    fn excluded_ids_are_removed_before_the_limit_applies() {
        let ranked = rank_entries(
            entries(&[("1", 5.0), ("2", 4.0), ("3", 3.0)]),
            &[ProductId::from("1")],
            2,
        );

        assert_eq!(
            ranked,
            vec![
                RankedProduct { product_id: ProductId::from("2"), score: 4.0 },
                RankedProduct { product_id: ProductId::from("3"), score: 3.0 },
            ]
        );
    }

    #[test]
    fn zero_limit_yields_nothing() {
        assert!(rank_entries(entries(&[("1", 5.0)]), &[], 0).is_empty());
    }

    #[test]
    fn distinct_ids_keeps_first_occurrence() {
        let ids = distinct_ids(&[
            ProductId::from("3"),
            ProductId::from("1"),
            ProductId::from("3"),
            ProductId::from("2"),
        ]);

        assert_eq!(ids, vec![ProductId::from("3"), ProductId::from("1"), ProductId::from("2")]);
    }

    #[test]
    fn order_by_rank_follows_rank_not_catalog_order_and_drops_missing() {
        let ranked = vec![
            RankedProduct { product_id: ProductId::from("7"), score: 3.0 },
            RankedProduct { product_id: ProductId::from("5"), score: 2.0 },
            RankedProduct { product_id: ProductId::from("9"), score: 1.0 },
        ];
        let resolved = vec![product("9"), product("7")];

        let ordered = order_by_rank(&ranked, resolved);
        let ids: Vec<&str> = ordered.iter().map(|product| product.id.as_str()).collect();

        assert_eq!(ids, vec!["7", "9"]);
    }
}
