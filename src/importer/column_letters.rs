// ==========================================
// 记录导入引擎 - 列字母换算
// ==========================================
// 职责: 表格列字母（A/B/.../AA）与列号互转
// ==========================================

/// 列字母 → 列号（从 0 开始）
///
/// 非字母字符被忽略，大小写不敏感；不含任何字母时返回 None
///
/// # 示例
/// - "A" → 0, "Z" → 25, "AA" → 26
pub fn column_index(letters: &str) -> Option<usize> {
    let mut num: usize = 0;
    let mut seen = false;
    for c in letters.chars().filter(|c| c.is_ascii_alphabetic()) {
        seen = true;
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        num = num.checked_mul(26)?.checked_add(digit)?;
    }
    if seen {
        Some(num - 1)
    } else {
        None
    }
}

/// 列号（从 1 开始）→ 列字母
///
/// # 示例
/// - 1 → "A", 26 → "Z", 27 → "AA"
pub fn column_letters(n: usize) -> String {
    let mut n = n;
    let mut letters = Vec::new();
    while n > 0 {
        let remainder = (n - 1) % 26;
        n = (n - 1) / 26;
        letters.push((b'A' + remainder as u8) as char);
    }
    letters.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_index() {
        assert_eq!(column_index("A"), Some(0));
        assert_eq!(column_index("Z"), Some(25));
        assert_eq!(column_index("AA"), Some(26));
        assert_eq!(column_index("ag"), Some(32));
        assert_eq!(column_index(""), None);
        assert_eq!(column_index("12"), None);
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(1), "A");
        assert_eq!(column_letters(26), "Z");
        assert_eq!(column_letters(27), "AA");
        assert_eq!(column_letters(0), "");
    }

    #[test]
    fn test_round_trip_first_columns() {
        for n in 1..=80 {
            assert_eq!(column_index(&column_letters(n)), Some(n - 1));
        }
    }
}
