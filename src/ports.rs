use anyhow::{bail, Context, Result};

/// Parse a port specification into a deduplicated list of TCP ports
/// (1..=65535), preserving first-appearance order.
///
/// Supported forms, freely combinable with commas:
/// - single port: `80`
/// - inclusive range: `1-1024`
/// - list: `80,443,22` or `80,8000-8010`
pub fn parse_ports(spec: &str) -> Result<Vec<u16>> {
    let mut out: Vec<u16> = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for item in spec.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }

        // Range `start-end`
        if let Some((a, b)) = item.split_once('-') {
            let start = parse_port(a.trim())
                .with_context(|| format!("invalid start in range: {item}"))?;
            let end = parse_port(b.trim())
                .with_context(|| format!("invalid end in range: {item}"))?;
            if start > end {
                bail!("invalid range {start}-{end} (start > end)");
            }
            for p in start..=end {
                if seen.insert(p) {
                    out.push(p);
                }
            }
            continue;
        }

        // Single number
        let p = parse_port(item).with_context(|| format!("invalid port value: {item}"))?;
        if seen.insert(p) {
            out.push(p);
        }
    }

    if out.is_empty() {
        bail!("no ports in specification: {spec:?}");
    }
    Ok(out)
}

fn parse_port(s: &str) -> Result<u16> {
    let val: u32 = s.parse().with_context(|| format!("not a number: {s}"))?;
    if val == 0 || val > 65535 {
        bail!("port out of range: {val}");
    }
    Ok(val as u16)
}
