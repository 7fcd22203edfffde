/// Strips every non-digit character from a CPF/CNPJ.
pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}
