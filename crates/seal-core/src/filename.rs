//! Output file naming

/// Build the stamped contract's file name from its number, the
/// counterparty abbreviation and the contract name.
///
/// Everything but letters, digits, `-` and `_` is removed; the name also
/// keeps ASCII and full-width parentheses.
///
/// ```
/// use seal_core::generate_output_filename;
///
/// assert_eq!(
///     generate_output_filename("HT-001", "ACME", "Services（A)"),
///     "HT-001ACMEServices（A).pdf"
/// );
/// ```
pub fn generate_output_filename(
    contract_number: &str,
    counterparty_abbr: &str,
    contract_name: &str,
) -> String {
    let number = clean(contract_number, &[]);
    let counterparty = clean(counterparty_abbr, &[]);
    let name = clean(contract_name, &['(', ')', '（', '）']);
    format!("{}{}{}.pdf", number, counterparty, name)
}

fn clean(value: &str, extra: &[char]) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_' || extra.contains(c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_chinese_fields() {
        assert_eq!(
            generate_output_filename("HT/2024 001", "华为", "采购合同（第一期）"),
            "HT2024001华为采购合同（第一期）.pdf"
        );
    }

    #[test]
    fn test_parentheses_only_kept_in_name() {
        assert_eq!(
            generate_output_filename("(1)", "(A)", "(N)"),
            "1A(N).pdf"
        );
    }

    #[test]
    fn test_path_separators_removed() {
        let name = generate_output_filename("../../etc", "x", "passwd");
        assert!(!name.contains('/'));
        assert!(!name.contains(".."));
        assert_eq!(name, "etcxpasswd.pdf");
    }

    #[test]
    fn test_empty_fields() {
        assert_eq!(generate_output_filename("", "", ""), ".pdf");
    }
}
