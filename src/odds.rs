/// Implied win probability of an American moneyline price.
///
/// Negative prices (favourites) map to `|price| / (|price| + 100)`, positive prices
/// (underdogs) to `100 / (price + 100)`. The vig is left in place.
pub fn moneyline_to_probability(price: f64) -> f64 {
    if price < 0.0 {
        let stake = price.abs();
        stake / (stake + 100.0)
    } else {
        100.0 / (price + 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_prices() {
        assert!((moneyline_to_probability(-110.0) - 0.5238).abs() < 1e-4);
        assert_eq!(moneyline_to_probability(100.0), 0.5);
        assert_eq!(moneyline_to_probability(-100.0), 0.5);
        assert!((moneyline_to_probability(300.0) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn favourites_grow_with_price_magnitude() {
        let mut last = 0.0;
        for price in [-101.0, -110.0, -150.0, -250.0, -600.0, -2000.0] {
            let p = moneyline_to_probability(price);
            assert!(p > last, "{price} -> {p} should exceed {last}");
            assert!(p < 1.0);
            last = p;
        }
    }

    #[test]
    fn underdogs_shrink_with_price() {
        let mut last = 1.0;
        for price in [100.0, 120.0, 180.0, 350.0, 900.0] {
            let p = moneyline_to_probability(price);
            assert!(p < last, "{price} -> {p} should be below {last}");
            assert!(p > 0.0);
            last = p;
        }
    }

    #[test]
    fn vig_is_not_removed() {
        let home = moneyline_to_probability(-110.0);
        let away = moneyline_to_probability(-110.0);
        assert!(home + away - 1.0 > 0.04);
    }
}
