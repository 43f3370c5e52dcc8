use num_format::{CustomFormat, Grouping, ToFormattedString};

pub fn number_format() -> CustomFormat {
    CustomFormat::builder()
        .grouping(Grouping::Standard)
        .minus_sign("-")
        .separator("_")
        .build()
        .unwrap_or_default()
}

/// e.g. `12_345` for log lines
pub fn count(value: usize) -> String {
    value.to_formatted_string(&number_format())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_grouping() {
        assert_eq!(count(7), "7");
        assert_eq!(count(12_345), "12_345");
        assert_eq!(count(1_000_000), "1_000_000");
    }
}
