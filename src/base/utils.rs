use std::fmt;

/// Helper struct that wraps a signed byte count and improves its [`std::fmt::Debug`] formatting.
/// Formats the value as a human-readable size, automatically selecting the most appropriate
/// unit (B, KiB, MiB, GiB, TiB). Trailing fractional zeros are omitted, and exact multiples
/// of a unit are printed without a decimal point entirely. Negative values keep their sign;
/// they occur when a memory budget is overcommitted.
///
/// # Examples
///
/// ```
/// # use squall::base::ByteSize;
/// assert_eq!(format!("{:?}", ByteSize(484)),        "484B");
/// assert_eq!(format!("{:?}", ByteSize(1536)),       "1.5KiB");
/// assert_eq!(format!("{:?}", ByteSize(2147483648)), "2GiB");
/// assert_eq!(format!("{:?}", ByteSize(2684354560)), "2.5GiB");
/// assert_eq!(format!("{:?}", ByteSize(-1024)),      "-1KiB");
/// ```
pub struct ByteSize(pub i64);

impl fmt::Debug for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const KIB: u64 = 1024;
        const MIB: u64 = 1024 * KIB;
        const GIB: u64 = 1024 * MIB;
        const TIB: u64 = 1024 * GIB;

        if self.0 < 0 {
            write!(f, "-")?;
        }

        macro_rules! fmt_unit {
            ($val:expr, $unit:expr, $unit_str:expr) => {{
                let whole = $val / $unit;
                let rem = $val % $unit;
                if rem == 0 {
                    write!(f, "{}{}", whole, $unit_str)
                } else {
                    // two decimal places via integer arithmetic:
                    // multiply remainder by 100, divide by unit to get 0-99
                    let frac = rem * 100 / $unit;
                    if frac % 10 == 0 {
                        // e.g. 1.50 -> 1.5
                        write!(f, "{}.{}{}", whole, frac / 10, $unit_str)
                    } else {
                        write!(f, "{}.{:02}{}", whole, frac, $unit_str)
                    }
                }
            }};
        }

        match self.0.unsigned_abs() {
            b if b >= TIB => fmt_unit!(b, TIB, "TiB"),
            b if b >= GIB => fmt_unit!(b, GIB, "GiB"),
            b if b >= MIB => fmt_unit!(b, MIB, "MiB"),
            b if b >= KIB => fmt_unit!(b, KIB, "KiB"),
            b => write!(f, "{}B", b),
        }
    }
}
