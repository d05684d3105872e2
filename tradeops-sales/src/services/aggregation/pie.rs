//! Five-slice financial breakdown for pie charts
//!
//! The slices decompose gross sales: Net Sales + Net Returns + Shipping +
//! COGS + Platform Fee reconstructs the gross Sales amount exactly, since
//! Net Sales is defined as the remainder. Every slice's detail rows sum
//! to the slice value (overpay shipping is carried negative for that
//! reason).

use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

use crate::models::{Action, CleanedTransaction, ShipType};

use super::{money, percent_of_sales, PieChart, PieDetail, PieSlice};

pub(super) fn build(
    rows: &[CleanedTransaction],
    unit_costs: &HashMap<String, Decimal>,
) -> PieChart {
    let mut sales = Decimal::ZERO;
    let mut action_totals: BTreeMap<&'static str, Decimal> = BTreeMap::new();
    let mut ship_totals = [Decimal::ZERO; 4];
    let mut cogs = Decimal::ZERO;
    let mut fees = Decimal::ZERO;

    for row in rows {
        if row.action == Action::Sale {
            sales += row.amount;
        } else {
            *action_totals.entry(row.action.label()).or_insert(Decimal::ZERO) += row.amount;
        }
        for (i, ship) in ShipType::ALL.iter().enumerate() {
            ship_totals[i] += row.shipping.get(*ship);
        }
        cogs += row.cogs(unit_costs);
        fees += row.fees.total();
    }

    let return_details: Vec<PieDetail> = action_totals
        .iter()
        .filter(|(_, total)| !total.is_zero())
        .map(|(label, total)| PieDetail {
            name: label.to_string(),
            value: money(total.abs()),
        })
        .collect();
    let returns: Decimal = action_totals.values().map(|total| total.abs()).sum();

    let ship_details: Vec<PieDetail> = ShipType::ALL
        .iter()
        .zip(ship_totals)
        .filter(|(_, total)| !total.is_zero())
        .map(|(ship, total)| PieDetail {
            name: ship.label().to_string(),
            // Overpay reduces shipping cost, so it carries a minus sign
            value: if *ship == ShipType::Overpay {
                money(-total)
            } else {
                money(total)
            },
        })
        .collect();
    let shipping = ship_totals[0] + ship_totals[1] - ship_totals[2] + ship_totals[3];

    let net_sales = sales - returns - shipping - cogs - fees;

    let slices = [
        ("Net Sales", net_sales, Vec::new()),
        ("Net Returns", returns, return_details),
        ("Shipping", shipping, ship_details),
        ("COGS", cogs, Vec::new()),
        ("Platform Fee", fees, Vec::new()),
    ];
    let pie_data = slices
        .into_iter()
        .map(|(name, value, detail)| PieSlice {
            name: name.to_string(),
            value: money(value),
            percent: percent_of_sales(value, sales),
            detail,
        })
        .collect();

    PieChart { pie_data }
}
