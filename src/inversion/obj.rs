use crate::error::{InversionError, Result};

/// Code reported in place of OBJ lines when an export fails.
pub const OBJ_FAILURE_CODE: &str = "11";

/// Format like C's `%g`: six significant digits, trailing zeros removed,
/// scientific notation for exponents below -4 or from 6 up.
pub fn format_general(value: f64) -> String {
    const PRECISION: i32 = 6;

    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let sci = format!("{:.*e}", (PRECISION - 1) as usize, value);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);

    if exp < -4 || exp >= PRECISION {
        let mantissa = strip_zeros(mantissa);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exp.abs())
    } else {
        let decimals = (PRECISION - 1 - exp) as usize;
        strip_zeros(&format!("{value:.decimals$}")).to_string()
    }
}

fn strip_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// OBJ lines for a triangle mesh: `v` lines, optional `vn` lines, then `f`
/// lines with 1-based indices. Every line ends in `delimiter`.
pub fn obj_lines(
    positions: &[f32],
    normals: Option<&[f32]>,
    indices: &[u32],
    delimiter: &str,
) -> Result<Vec<String>> {
    if positions.len() % 3 != 0 || indices.len() % 3 != 0 {
        return Err(InversionError::Output(format!(
            "ragged mesh buffers: {} positions, {} indices",
            positions.len(),
            indices.len()
        )));
    }
    let vertex_count = positions.len() / 3;
    if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
        return Err(InversionError::Output(format!(
            "face index {bad} out of range for {vertex_count} vertices"
        )));
    }
    if let Some(n) = normals.filter(|n| n.len() != positions.len()) {
        return Err(InversionError::Output(format!(
            "{} normal values for {} positions",
            n.len(),
            positions.len()
        )));
    }

    let g = |v: f32| format_general(v as f64);
    let normal_lines = normals.map_or(0, |n| n.len() / 3);
    let mut lines = Vec::with_capacity(vertex_count + normal_lines + indices.len() / 3);

    for p in positions.chunks_exact(3) {
        lines.push(format!("v {} {} {}{delimiter}", g(p[0]), g(p[1]), g(p[2])));
    }
    if let Some(normals) = normals {
        for n in normals.chunks_exact(3) {
            lines.push(format!("vn {} {} {}{delimiter}", g(n[0]), g(n[1]), g(n[2])));
        }
    }
    for f in indices.chunks_exact(3) {
        let (a, b, c) = (f[0] + 1, f[1] + 1, f[2] + 1);
        if normals.is_some() {
            lines.push(format!("f {a}//{a} {b}//{b} {c}//{c}{delimiter}"));
        } else {
            lines.push(format!("f {a} {b} {c}{delimiter}"));
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn general_format_fixed_range() {
        assert_eq!(format_general(0.0), "0");
        assert_eq!(format_general(1.0), "1");
        assert_eq!(format_general(-2.5), "-2.5");
        assert_eq!(format_general(0.1), "0.1");
        assert_eq!(format_general(1.23456789), "1.23457");
        assert_eq!(format_general(123456.0), "123456");
        assert_eq!(format_general(0.0001), "0.0001");
        assert_eq!(format_general(0.000123456), "0.000123456");
    }

    #[test]
    fn general_format_scientific_range() {
        assert_eq!(format_general(1234567.0), "1.23457e+06");
        assert_eq!(format_general(0.00001), "1e-05");
        assert_eq!(format_general(-0.0000123), "-1.23e-05");
        assert_eq!(format_general(1e100), "1e+100");
    }

    #[test]
    fn general_format_rounding_crosses_exponent() {
        // 999999.5 rounds to 1e+06 at six digits.
        assert_eq!(format_general(999999.5), "1e+06");
        assert_eq!(format_general(9.999996), "10");
    }

    #[test]
    fn general_format_non_finite() {
        assert_eq!(format_general(f64::NAN), "nan");
        assert_eq!(format_general(f64::INFINITY), "inf");
        assert_eq!(format_general(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn faces_are_one_based() {
        let positions = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.5, 0.0];
        let lines = obj_lines(&positions, None, &[0, 1, 2], "\n").unwrap();
        assert_eq!(
            lines,
            vec!["v 0 0 0\n", "v 1 0 0\n", "v 0 0.5 0\n", "f 1 2 3\n"]
        );
    }

    #[test]
    fn custom_delimiter() {
        let lines = obj_lines(&[0.25, 0.0, 0.0], None, &[], "|").unwrap();
        assert_eq!(lines, vec!["v 0.25 0 0|"]);
    }

    #[test]
    fn invalid_buffers_are_output_errors() {
        let err = obj_lines(&[0.0; 9], None, &[0, 1, 3], "\n").unwrap_err();
        assert!(matches!(err, InversionError::Output(_)));
        assert!(obj_lines(&[0.0; 8], None, &[], "\n").is_err());
        assert!(obj_lines(&[0.0; 9], Some(&[0.0; 6]), &[0, 1, 2], "\n").is_err());
    }
}
