//! Text form for resource vectors.
//!
//! The grammar mirrors how operators and tests write resources:
//!
//! ```text
//! cpus:2;mem:1024
//! cpus(engineering):2;disk(engineering)[id1:data]:100
//! ports:[31000-32000,40000-41000];labels:{a,b}
//! ```
//!
//! `name(role)` tags a reservation; `(*)` is the explicit unreserved tag.
//! `[id:path]` before the colon marks a persistent volume. Revocable and
//! shared flags have no text form; they are set via the `Resource`
//! builders.

use acre_id::RoleName;

use crate::{Ranges, Resource, ResourceError, ResourceVector, Scalar, TextSet, Value};

/// Parses a `;`-separated list of resource tokens.
pub(crate) fn parse_vector(s: &str) -> Result<ResourceVector, ResourceError> {
    let mut vector = ResourceVector::new();
    for token in split_top_level(s) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        vector.push(parse_resource(token)?);
    }
    Ok(vector)
}

// `;` separates tokens but also legally appears nowhere else, so a plain
// split is enough; brackets and braces never nest.
fn split_top_level(s: &str) -> impl Iterator<Item = &str> {
    s.split(';')
}

fn parse_resource(token: &str) -> Result<Resource, ResourceError> {
    let malformed = |what: &str| ResourceError::Malformed(format!("{what} in '{token}'"));

    let (head, value) = token
        .split_once(':')
        .ok_or_else(|| malformed("missing ':'"))?;

    // Volume metadata: name(role)[id:path] — the value is after the
    // closing bracket, so re-split when the head opens a bracket.
    let (head, value, disk) = match head.find('[') {
        None => (head, value, None),
        Some(open) => {
            let close = token.find(']').ok_or_else(|| malformed("unclosed '['"))?;
            let inner = &token[open + 1..close];
            let (id, path) = inner
                .split_once(':')
                .ok_or_else(|| malformed("volume must be [id:path]"))?;
            let value = token[close + 1..]
                .strip_prefix(':')
                .ok_or_else(|| malformed("missing value"))?;
            (&head[..open], value, Some((id, path)))
        }
    };

    let (name, role) = match head.split_once('(') {
        None => (head, None),
        Some((name, rest)) => {
            let role = rest
                .strip_suffix(')')
                .ok_or_else(|| malformed("unclosed '('"))?;
            (name, Some(role))
        }
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(malformed("empty name"));
    }

    let value = parse_value(value.trim()).map_err(|_| malformed("bad value"))?;

    let mut resource = Resource {
        name: name.to_string(),
        value,
        reservation: crate::Reservation::Unreserved,
        revocable: false,
        disk: None,
        shared: false,
    };

    if let Some(role) = role {
        let role = role.trim();
        // `(*)` is the explicit spelling of "unreserved".
        if role != "*" {
            let role = RoleName::parse(role)
                .map_err(|e| ResourceError::Malformed(e.to_string()))?;
            resource = resource.reserved_for(role);
        }
    }

    if let Some((id, path)) = disk {
        resource = resource.with_volume(id.trim(), path.trim());
    }

    resource.validate()?;
    Ok(resource)
}

fn parse_value(s: &str) -> Result<Value, ResourceError> {
    let malformed = || ResourceError::Malformed(format!("invalid value '{s}'"));

    if let Some(inner) = s.strip_prefix('[') {
        let inner = inner.strip_suffix(']').ok_or_else(malformed)?;
        let mut pairs = Vec::new();
        for part in inner.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (begin, end) = part.split_once('-').ok_or_else(malformed)?;
            let begin = begin.trim().parse::<u64>().map_err(|_| malformed())?;
            let end = end.trim().parse::<u64>().map_err(|_| malformed())?;
            if begin > end {
                return Err(malformed());
            }
            pairs.push((begin, end));
        }
        return Ok(Value::Ranges(Ranges::new(pairs)));
    }

    if let Some(inner) = s.strip_prefix('{') {
        let inner = inner.strip_suffix('}').ok_or_else(malformed)?;
        let items = inner
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string);
        return Ok(Value::Set(TextSet::new(items)));
    }

    s.parse::<Scalar>().map(Value::Scalar)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalars() {
        let v = ResourceVector::parse("cpus:2;mem:1024;disk:0").unwrap();
        assert_eq!(v.scalar_total("cpus"), Scalar::units(2));
        assert_eq!(v.scalar_total("mem"), Scalar::units(1024));
        // Zero quantities vanish.
        assert_eq!(v.iter().count(), 2);
    }

    #[test]
    fn test_parse_reserved() {
        let role = RoleName::parse("engineering").unwrap();
        let v = ResourceVector::parse("cpus(engineering):2;cpus:1").unwrap();
        assert_eq!(v.reserved(&role).scalar_total("cpus"), Scalar::units(2));
        assert_eq!(v.unreserved().scalar_total("cpus"), Scalar::units(1));
    }

    #[test]
    fn test_parse_star_is_unreserved() {
        let v = ResourceVector::parse("cpus(*):2").unwrap();
        assert_eq!(v.unreserved().scalar_total("cpus"), Scalar::units(2));
    }

    #[test]
    fn test_parse_ranges_and_sets() {
        let v = ResourceVector::parse("ports:[31000-32000,40000-41000];labels:{a,b}").unwrap();
        assert_eq!(v.iter().count(), 2);
    }

    #[test]
    fn test_parse_volume() {
        let v = ResourceVector::parse("disk(engineering)[id1:data]:100").unwrap();
        let volume = v.iter().next().unwrap();
        assert!(volume.is_persistent_volume());
        assert_eq!(volume.disk.as_ref().unwrap().id, "id1");
        assert_eq!(volume.to_string(), "disk(engineering)[id1:data]:100");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in [
            "cpus",
            "cpus:",
            ":2",
            "cpus(:2",
            "cpus(bad role):2",
            "ports:[10-5]",
            "mem[id:path]:10",
            "disk[id]:10",
        ] {
            assert!(
                ResourceVector::parse(bad).is_err(),
                "expected '{bad}' to be rejected"
            );
        }
    }

    #[test]
    fn test_display_roundtrip() {
        let text = "cpus:2.5;mem(engineering):1024;ports:[31000-32000]";
        let v = ResourceVector::parse(text).unwrap();
        assert_eq!(ResourceVector::parse(&v.to_string()).unwrap(), v);
    }
}
