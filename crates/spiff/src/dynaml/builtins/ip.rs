//! IPv4/IPv6 address arithmetic
//!
//! Addresses are handled as `u128` together with their family, so both families
//! share the same range and offset logic.
use super::{arity, flatten, string_argument};
use crate::binding::Binding;
use crate::dynaml::Outcome;
use crate::node::{Lookup, Node, Value};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    V4,
    V6,
}

impl Family {
    fn bits(self) -> u32 {
        match self {
            Family::V4 => 32,
            Family::V6 => 128,
        }
    }

    fn max(self) -> u128 {
        match self {
            Family::V4 => u32::MAX as u128,
            Family::V6 => u128::MAX,
        }
    }
}

/// Inclusive address range of one family
#[derive(Debug, Clone, Copy, PartialEq)]
struct Range {
    first: u128,
    last: u128,
    family: Family,
}

impl Range {
    /// Number of addresses, saturating for the full IPv6 space
    fn size(&self) -> u128 {
        (self.last - self.first).saturating_add(1)
    }
}

fn parse_address(text: &str) -> Result<(u128, Family), String> {
    match text.trim().parse::<IpAddr>() {
        Ok(IpAddr::V4(address)) => Ok((u32::from(address) as u128, Family::V4)),
        Ok(IpAddr::V6(address)) => Ok((u128::from(address), Family::V6)),
        Err(_) => Err(format!("'{}' is no IP address", text.trim())),
    }
}

pub(crate) fn is_address(text: &str) -> bool {
    parse_address(text).is_ok()
}

fn format_address(value: u128, family: Family) -> String {
    match family {
        Family::V4 => Ipv4Addr::from(value as u32).to_string(),
        Family::V6 => Ipv6Addr::from(value).to_string(),
    }
}

fn parse_cidr(text: &str) -> Result<Range, String> {
    let Some((address, prefix)) = text.split_once('/') else {
        return Err(format!("'{text}' is no CIDR"));
    };
    let (value, family) = parse_address(address)?;
    let prefix = prefix
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|prefix| *prefix <= family.bits())
        .ok_or_else(|| format!("invalid prefix length in CIDR '{text}'"))?;

    let host_bits = family.bits() - prefix;
    let mask = match host_bits {
        128 => u128::MAX,
        bits => (1u128 << bits) - 1,
    };
    Ok(Range {
        first: value & !mask,
        last: value | mask,
        family,
    })
}

/// `a - b`, `a/prefix` or a single address
fn parse_range(text: &str) -> Result<Range, String> {
    if text.contains('/') {
        return parse_cidr(text);
    }
    match text.split_once('-') {
        Some((first, last)) => {
            let (first, family) = parse_address(first)?;
            let (last, last_family) = parse_address(last)?;
            if family != last_family || first > last {
                return Err(format!("invalid IP range '{text}'"));
            }
            Ok(Range {
                first,
                last,
                family,
            })
        }
        None => {
            let (address, family) = parse_address(text)?;
            Ok(Range {
                first: address,
                last: address,
                family,
            })
        }
    }
}

pub(crate) fn offset(address: &str, delta: i128) -> Result<String, String> {
    let (value, family) = parse_address(address)?;
    let moved = if delta >= 0 {
        value.checked_add(delta.unsigned_abs())
    } else {
        value.checked_sub(delta.unsigned_abs())
    };
    match moved {
        Some(moved) if moved <= family.max() => Ok(format_address(moved, family)),
        _ => Err(format!("IP address {address} offset by {delta} out of range")),
    }
}

/// Signed number of addresses from `b` to `a`
pub(crate) fn distance(a: &str, b: &str) -> Result<i64, String> {
    let (a, family) = parse_address(a)?;
    let (b, other) = parse_address(b)?;
    if family != other {
        return Err("IP addresses of different families".to_string());
    }
    let distance = if a >= b {
        i64::try_from(a - b)
    } else {
        i64::try_from(b - a).map(|d| -d)
    };
    distance.map_err(|_| "integer overflow".to_string())
}

fn cidr_argument(name: &str, arguments: &[Node]) -> Result<Range, Outcome> {
    arity(name, arguments, 1, 1)?;
    let cidr = string_argument(name, 0, &arguments[0])?;
    parse_cidr(cidr).map_err(|issue| Outcome::failed(format!("{name}: {issue}")))
}

pub(super) fn min_ip(arguments: &[Node], binding: &Binding<'_>) -> Outcome {
    let range = attempt!(cidr_argument("min_ip", arguments));
    Outcome::value(format_address(range.first, range.family), binding)
}

pub(super) fn max_ip(arguments: &[Node], binding: &Binding<'_>) -> Outcome {
    let range = attempt!(cidr_argument("max_ip", arguments));
    Outcome::value(format_address(range.last, range.family), binding)
}

pub(super) fn num_ip(arguments: &[Node], binding: &Binding<'_>) -> Outcome {
    let range = attempt!(cidr_argument("num_ip", arguments));
    match range
        .last
        .checked_sub(range.first)
        .and_then(|d| d.checked_add(1))
        .and_then(|n| i64::try_from(n).ok())
    {
        Some(count) => Outcome::value(count, binding),
        None => Outcome::failed("num_ip: integer overflow"),
    }
}

/// Resolved value of the nearest `key`, deferring while it is still an expression
fn nearest<'b>(binding: &'b Binding<'_>, key: &str) -> Result<&'b Node, Outcome> {
    match binding.find_reference(&[key]) {
        Lookup::Found(node) if node.is_locally_resolved() => Ok(node),
        Lookup::Found(_) | Lookup::Unresolved => Err(Outcome::deferred()),
        Lookup::NotFound => Err(Outcome::failed(format!("static_ips: no '{key}' found"))),
    }
}

/// Addresses from the `static` ranges of all subnets of the enclosing network
///
/// The network is named by the nearest `name`, the number of addresses is the
/// nearest `instances`. Every argument (or list entry) is an index into the
/// concatenated ranges.
pub(super) fn static_ips(arguments: &[Node], binding: &Binding<'_>) -> Outcome {
    attempt!(arity("static_ips", arguments, 1, usize::MAX));

    let mut indices = vec![];
    for entry in flatten(arguments) {
        match entry.value() {
            Value::Integer(index) if *index >= 0 => indices.push(*index as u128),
            other => {
                return Outcome::failed(format!(
                    "static_ips: indices must be non-negative integers, got {}",
                    other.type_name()
                ))
            }
        }
    }

    let instances = match attempt!(nearest(binding, "instances")).value() {
        Value::Integer(instances) if *instances >= 0 => *instances as usize,
        other => {
            return Outcome::failed(format!(
                "static_ips: instances must be a non-negative integer, got {}",
                other.type_name()
            ))
        }
    };
    let network = match attempt!(nearest(binding, "name")).value() {
        Value::String(name) => name.clone(),
        other => {
            return Outcome::failed(format!(
                "static_ips: network name must be a string, got {}",
                other.type_name()
            ))
        }
    };

    let ranges = attempt!(static_ranges(binding, &network));
    tracing::trace!(%network, ranges = ranges.len(), instances, "static ips");

    if indices.len() < instances {
        return Outcome::failed(format!(
            "static_ips: {instances} instances but only {} indices",
            indices.len()
        ));
    }

    let source_name = binding.source_name().cloned();
    let mut addresses = Vec::with_capacity(instances);
    for index in indices.into_iter().take(instances) {
        match address_at(&ranges, index) {
            Some(address) => addresses.push(Node::new(address, source_name.clone())),
            None => {
                return Outcome::failed(format!(
                    "static_ips: index {index} out of range of network '{network}'"
                ))
            }
        }
    }
    Outcome::value(addresses, binding)
}

/// `networks.<network>.subnets[*].static`
fn static_ranges(binding: &Binding<'_>, network: &str) -> Result<Vec<Range>, Outcome> {
    let subnets = match binding.find_from_root(&["networks", network, "subnets"]) {
        Lookup::Found(subnets) => subnets,
        Lookup::Unresolved => return Err(Outcome::deferred()),
        Lookup::NotFound => {
            return Err(Outcome::failed(format!(
                "static_ips: no subnets found for network '{network}'"
            )))
        }
    };
    let Value::List(subnets) = subnets.value() else {
        if !subnets.is_locally_resolved() {
            return Err(Outcome::deferred());
        }
        return Err(Outcome::failed("static_ips: subnets must be a list"));
    };

    let mut ranges = vec![];
    for subnet in subnets {
        if !subnet.is_locally_resolved() {
            return Err(Outcome::deferred());
        }
        let Some(statics) = subnet.get("static") else {
            continue;
        };
        let specs: Vec<&Node> = match statics.value() {
            Value::List(specs) => specs.iter().collect(),
            _ => vec![statics],
        };
        for spec in specs {
            match spec.value() {
                Value::String(text) if spec.is_locally_resolved() => {
                    let range = parse_range(text)
                        .map_err(|issue| Outcome::failed(format!("static_ips: {issue}")))?;
                    ranges.push(range);
                }
                _ if !spec.is_locally_resolved() => return Err(Outcome::deferred()),
                other => {
                    return Err(Outcome::failed(format!(
                        "static_ips: static ranges must be strings, got {}",
                        other.type_name()
                    )))
                }
            }
        }
    }
    Ok(ranges)
}

fn address_at(ranges: &[Range], mut index: u128) -> Option<String> {
    for range in ranges {
        if index < range.size() {
            return Some(format_address(range.first + index, range.family));
        }
        index -= range.size();
    }
    None
}

#[cfg(test)]
mod test {
    use super::super::super::test::{eval, eval_in, issue_of, value_of};
    use super::*;
    use crate::yaml;
    use pretty_assertions::assert_eq;

    fn strings(values: &[&str]) -> Value {
        Value::List(values.iter().map(|v| Node::new(*v, None)).collect())
    }

    #[test]
    fn offsets_cross_octets() {
        assert_eq!(offset("10.0.0.255", 1), Ok("10.0.1.0".to_string()));
        assert_eq!(offset("10.0.1.0", -1), Ok("10.0.0.255".to_string()));
        assert_eq!(offset("::ffff", 1), Ok("::1:0".to_string()));
        assert!(offset("255.255.255.255", 1).is_err());
        assert!(offset("0.0.0.0", -1).is_err());
        assert!(offset("web", 1).is_err());
    }

    #[test]
    fn distances() {
        assert_eq!(distance("10.0.1.0", "10.0.0.0"), Ok(256));
        assert_eq!(distance("10.0.0.0", "10.0.1.0"), Ok(-256));
        assert!(distance("10.0.0.0", "::1").is_err());
    }

    #[test]
    fn cidr_bounds() {
        assert_eq!(value_of(eval("min_ip(\"10.0.0.17/24\")")), Value::from("10.0.0.0"));
        assert_eq!(value_of(eval("max_ip(\"10.0.0.17/24\")")), Value::from("10.0.0.255"));
        assert_eq!(value_of(eval("num_ip(\"10.0.0.0/30\")")), Value::Integer(4));
        assert_eq!(value_of(eval("num_ip(\"10.0.0.1/32\")")), Value::Integer(1));
        assert_eq!(value_of(eval("max_ip(\"fd00::/120\")")), Value::from("fd00::ff"));
        assert_eq!(
            issue_of(eval("min_ip(\"10.0.0.0/33\")")),
            "min_ip: invalid prefix length in CIDR '10.0.0.0/33'"
        );
        assert_eq!(issue_of(eval("num_ip(\"::/0\")")), "num_ip: integer overflow");
    }

    #[test]
    fn ranges() {
        assert_eq!(
            parse_range("10.0.0.10 - 10.0.0.12"),
            Ok(Range {
                first: 0x0a00_000a,
                last: 0x0a00_000c,
                family: Family::V4
            })
        );
        assert!(parse_range("10.0.0.12 - 10.0.0.10").is_err());
        assert_eq!(parse_range("10.0.0.4/31").map(|r| r.size()), Ok(2));
    }

    #[test]
    fn static_ips_index_concatenated_ranges() {
        let document = yaml!(
            r#"
            networks:
              - name: net
                subnets:
                  - static: ["10.0.0.10 - 10.0.0.12", 10.0.0.20]
                  - static: 10.0.1.0/31
            name: net
            instances: 3
            "#
        );
        assert_eq!(
            value_of(eval_in(&document, &[], "static_ips(0, 2, 3)")),
            strings(&["10.0.0.10", "10.0.0.12", "10.0.0.20"])
        );
        assert_eq!(
            value_of(eval_in(&document, &[], "static_ips([4, 5], 0)")),
            strings(&["10.0.1.0", "10.0.1.1", "10.0.0.10"])
        );
        assert_eq!(
            issue_of(eval_in(&document, &[], "static_ips(0, 1, 6)")),
            "static_ips: index 6 out of range of network 'net'"
        );
        assert_eq!(
            issue_of(eval_in(&document, &[], "static_ips(0)")),
            "static_ips: 3 instances but only 1 indices"
        );
    }

    #[test]
    fn static_ips_wait_for_instances() {
        let document = yaml!(
            r#"
            networks: [{name: net, subnets: [{static: [10.0.0.1]}]}]
            name: net
            instances: (( count ))
            "#
        );
        assert!(matches!(
            eval_in(&document, &[], "static_ips(0)"),
            Outcome::Deferred(_)
        ));
    }
}
