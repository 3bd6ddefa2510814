use chrono::{DateTime, Utc};

/// Форматирует число с разделителями тысяч (точками)
///
/// # Примеры
/// ```
/// use backend::shared::format::format_number;
/// assert_eq!(format_number(1234567), "1.234.567");
/// assert_eq!(format_number(42), "42");
/// ```
pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push('.');
        }
        result.push(ch);
    }
    result.chars().rev().collect()
}

/// Форматирует сумму в рублях: "1.234,50 ₽"
pub fn format_currency(amount: f64) -> String {
    let kopecks = (amount * 100.0).round() as i64;
    let sign = if kopecks < 0 { "-" } else { "" };
    let kopecks = kopecks.abs();
    format!(
        "{}{},{:02} ₽",
        sign,
        format_number((kopecks / 100) as usize),
        kopecks % 100
    )
}

/// Дата/время в привычном для дашборда виде: "25.08.2026 14:30"
pub fn format_date(dt: &DateTime<Utc>) -> String {
    dt.format("%d.%m.%Y %H:%M").to_string()
}

/// Приводит российский номер телефона к виду "+7 (999) 123-45-67".
/// Если номер не распознан, возвращает вход без изменений.
pub fn format_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let digits = match digits.len() {
        11 if digits.starts_with('8') || digits.starts_with('7') => digits[1..].to_string(),
        10 => digits,
        _ => return raw.to_string(),
    };
    format!(
        "+7 ({}) {}-{}-{}",
        &digits[0..3],
        &digits[3..6],
        &digits[6..8],
        &digits[8..10]
    )
}

/// Проверка обязательного поля
pub fn validate_required(value: &str, field: &str) -> anyhow::Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("Поле \"{}\" обязательно для заполнения", field);
    }
    Ok(())
}

/// Проверка телефона: 10 цифр, либо 11 с ведущей 7/8
pub fn validate_phone(value: &str) -> anyhow::Result<()> {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    let ok = digits.len() == 10
        || (digits.len() == 11 && (digits.starts_with('7') || digits.starts_with('8')));
    if !ok {
        anyhow::bail!("Некорректный номер телефона: {}", value);
    }
    Ok(())
}

/// Минимальная проверка e-mail: непустые части вокруг единственной "@"
pub fn validate_email(value: &str) -> anyhow::Result<()> {
    let mut parts = value.split('@');
    let (local, domain) = (parts.next().unwrap_or(""), parts.next().unwrap_or(""));
    let ok = parts.next().is_none()
        && !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.');
    if !ok {
        anyhow::bail!("Некорректный e-mail: {}", value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(42), "42");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1.000");
        assert_eq!(format_number(1234567), "1.234.567");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0), "0,00 ₽");
        assert_eq!(format_currency(1234.5), "1.234,50 ₽");
        assert_eq!(format_currency(-99.99), "-99,99 ₽");
    }

    #[test]
    fn test_format_date() {
        let dt = Utc.with_ymd_and_hms(2026, 8, 25, 14, 30, 0).unwrap();
        assert_eq!(format_date(&dt), "25.08.2026 14:30");
    }

    #[test]
    fn test_format_phone() {
        assert_eq!(format_phone("79991234567"), "+7 (999) 123-45-67");
        assert_eq!(format_phone("8 (999) 123-45-67"), "+7 (999) 123-45-67");
        assert_eq!(format_phone("9991234567"), "+7 (999) 123-45-67");
        // нераспознанное возвращается как есть
        assert_eq!(format_phone("12345"), "12345");
    }

    #[test]
    fn test_validators() {
        assert!(validate_required("x", "имя").is_ok());
        assert!(validate_required("   ", "имя").is_err());
        assert!(validate_phone("+7 999 123 45 67").is_ok());
        assert!(validate_phone("123").is_err());
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("user@@example.com").is_err());
        assert!(validate_email("user@example").is_err());
    }
}
