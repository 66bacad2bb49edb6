//! 人間が読みやすいサイズ表記

const UNITS: [&str; 7] = ["", "K", "M", "G", "T", "P", "E"];

/// バイト数を 1024 単位の短い表記に変換する
///
/// 1024 で割る（各段で四捨五入）ことを値が 1024 未満になるまで繰り返し、単位を決めます。
/// 2 の冪または単位のちょうど倍数の値は整数で、それ以外は
/// 商が 10 未満なら小数 2 桁、100 未満なら小数 1 桁で表します。
///
/// # Examples
/// ```
/// use vmsift_core::format_size;
///
/// assert_eq!(format_size(1023), "1023");
/// assert_eq!(format_size(1536), "1.50K");
/// assert_eq!(format_size(1 << 30), "1G");
/// ```
pub fn format_size(num: u64) -> String {
    let mut n = num;
    let mut index = 0usize;

    while n >= 1024 {
        n = n / 1024 + u64::from(n % 1024 >= 512);
        index += 1;
    }

    if index == 0 {
        return n.to_string();
    }

    let unit = UNITS[index];
    let divisor = 1u64 << (10 * index);
    let exact = num.is_power_of_two() || num % divisor == 0;
    let value = num as f64 / divisor as f64;

    if !exact && n < 10 {
        format!("{:.2}{}", value, unit)
    } else if !exact && n < 100 {
        format!("{:.1}{}", value, unit)
    } else {
        format!("{}{}", n, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_below_one_kilobyte() {
        assert_eq!(format_size(0), "0");
        assert_eq!(format_size(1), "1");
        assert_eq!(format_size(1000), "1000");
        assert_eq!(format_size(1023), "1023");
    }

    #[test]
    fn test_powers_of_two() {
        assert_eq!(format_size(1024), "1K");
        assert_eq!(format_size(4096), "4K");
        assert_eq!(format_size(1 << 20), "1M");
        assert_eq!(format_size(1 << 30), "1G");
        assert_eq!(format_size(1 << 40), "1T");
        assert_eq!(format_size(1 << 63), "8E");
    }

    #[test]
    fn test_fractions() {
        assert_eq!(format_size(1536), "1.50K");
        assert_eq!(format_size(15_460), "15.1K");
        assert_eq!(format_size(3 * (1 << 20) / 2), "1.50M");
        assert_eq!(format_size(u64::MAX), "16.0E");
    }

    #[test]
    fn test_exact_multiples() {
        assert_eq!(format_size(10_240), "10K");
        assert_eq!(format_size(3 * 1024), "3K");
        assert_eq!(format_size(100 * (1 << 20)), "100M");
    }

    #[test]
    fn test_large_quotient_is_integer() {
        // 商が 100 以上なら小数は付かない
        assert_eq!(format_size(1_048_000), "1023K");
        assert_eq!(format_size(500 * 1024 + 1), "500K");
    }
}
