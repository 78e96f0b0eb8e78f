use serde::Serialize;
use serde_json::ser::PrettyFormatter;

/// Serializes `value` as JSON indented with one tab per level.
pub fn to_tabbed_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"\t"));
    value.serialize(&mut ser)?;
    Ok(buf)
}
