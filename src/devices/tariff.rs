use serde::Deserialize;

/// Consumer tariff applied on top of the wholesale power price.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndUserTariff {
    /// Volumetric surcharges, levies and network charges (EUR/MWh).
    pub surcharges_eur_per_mwh: f64,
    /// Value added tax as fraction, e.g. 0.19.
    pub vat: f64,
    /// Capacity based network charge (EUR/MW of peak increase).
    pub capacity_charge_eur_per_mw: f64,
    /// Fixed power price replacing the market price if set (EUR/MWh).
    pub static_power_price: Option<f64>,
}

impl Default for EndUserTariff {
    fn default() -> Self {
        Self {
            surcharges_eur_per_mwh: 0.0,
            vat: 0.0,
            capacity_charge_eur_per_mw: 0.0,
            static_power_price: None,
        }
    }
}

impl EndUserTariff {
    /// Gross consumer price for a given wholesale power price.
    pub fn consumer_price(&self, power_price: f64) -> f64 {
        (power_price + self.surcharges_eur_per_mwh) * (1.0 + self.vat)
    }

    /// Consumer price component excluding the power price itself.
    pub fn price_addition(&self, power_price: f64) -> f64 {
        self.consumer_price(power_price) - power_price
    }

    /// Power price to use: the static one if set, otherwise the market price.
    pub fn power_price(&self, market_price: f64) -> f64 {
        self.static_power_price.unwrap_or(market_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addition_contains_surcharges_and_vat() {
        let tariff = EndUserTariff {
            surcharges_eur_per_mwh: 100.0,
            vat: 0.2,
            ..Default::default()
        };
        assert!((tariff.consumer_price(50.0) - 180.0).abs() < 1e-9);
        assert!((tariff.price_addition(50.0) - 130.0).abs() < 1e-9);
    }

    #[test]
    fn static_price_overrides_market() {
        let tariff = EndUserTariff {
            static_power_price: Some(30.0),
            ..Default::default()
        };
        assert_eq!(tariff.power_price(80.0), 30.0);
        assert_eq!(EndUserTariff::default().power_price(80.0), 80.0);
    }
}
