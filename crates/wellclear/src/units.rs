/**
 * Internal computations are all carried out in SI units: meters, meters per
 * second, radians and seconds. Aviation interfaces speak nautical miles,
 * feet, knots, feet per minute and degrees, so conversion factors are needed
 * at the boundary, in particular when reading parameter files.
 */
use once_cell::sync::Lazy;
use regex::Regex;

/// One nautical mile in meters
pub const NMI: f64 = 1852.0;
/// One foot in meters
pub const FT: f64 = 0.3048;
/// One knot in meters per second
pub const KN: f64 = NMI / 3600.0;
/// One foot per minute in meters per second
pub const FPM: f64 = FT / 60.0;
/// One degree in radians
pub const DEG: f64 = std::f64::consts::PI / 180.0;
/// Standard gravity in m/s²
pub const G: f64 = 9.80665;

/// Conversion factor from a unit name to SI. Unknown units default to 1
/// (the value is assumed to be internal already).
pub fn factor(unit: &str) -> f64 {
    match unit.trim() {
        "nmi" | "NM" | "nm" => NMI,
        "ft" => FT,
        "kn" | "knot" | "kts" => KN,
        "fpm" | "ft/min" => FPM,
        "deg" | "°" => DEG,
        "deg/s" => DEG,
        "m/s^2" | "m/s2" => 1.0,
        "G" | "g" => G,
        "m" | "s" | "m/s" | "rad" | "rad/s" | "" => 1.0,
        _ => 1.0,
    }
}

/// Convert a value expressed in `unit` into internal units.
pub fn from(value: f64, unit: &str) -> f64 {
    value * factor(unit)
}

/// Convert an internal value into `unit`.
pub fn to(value: f64, unit: &str) -> f64 {
    value / factor(unit)
}

static VALUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([-+]?[0-9]*\.?[0-9]+(?:[eE][-+]?[0-9]+)?)\s*(?:\[([^\]]*)\])?\s*$").unwrap()
});

/// Parse a `"<number> [<unit>]"` string, e.g. `"0.66 [nmi]"` or `"35"`.
pub fn parse(text: &str) -> Result<f64, String> {
    let caps = VALUE_RE
        .captures(text)
        .ok_or_else(|| format!("Invalid value: {}", text))?;
    let value: f64 = caps[1]
        .parse()
        .map_err(|e| format!("Number parse error: {}", e))?;
    let unit = caps.get(2).map_or("", |m| m.as_str());
    Ok(from(value, unit))
}

/// Normalize an angle to [0, 2π)
pub fn to_2pi(rad: f64) -> f64 {
    let two_pi = 2.0 * std::f64::consts::PI;
    let r = rad % two_pi;
    if r < 0.0 {
        r + two_pi
    } else {
        r
    }
}

/// Normalize a value into [0, modulo); identity when modulo is 0
pub fn to_2pi_mod(v: f64, modulo: f64) -> f64 {
    if modulo <= 0.0 {
        return v;
    }
    let r = v % modulo;
    if r < 0.0 {
        r + modulo
    } else {
        r
    }
}

/// Normalize an angle to (-π, π]
pub fn to_pi(rad: f64) -> f64 {
    let r = to_2pi(rad);
    if r > std::f64::consts::PI {
        r - 2.0 * std::f64::consts::PI
    } else {
        r
    }
}
