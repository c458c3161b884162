use indexmap::IndexMap;
use zl_a1c::Item;
use zl_arena::RawArena;

use crate::error::LocalParamsError;
use crate::params::{build, BlobParam, IntParam, LocalParams};

/// Interprets a CBOR node that may be absent, `null`, an inline
/// `{"ints": {...}, "blobs": {...}}` map, or a string reference into a
/// params dictionary, producing a resolved [`LocalParams`] that always
/// inherits `base`'s reference parameters (§4.B `resolve`: ref-params are
/// never carried on the wire, so every resolution path falls back to the
/// caller's base set for them).
pub fn resolve<'a>(
    arena: &'a dyn RawArena,
    cbor: Option<&Item<'_>>,
    dictionary: &IndexMap<String, LocalParams<'a>>,
    base: &LocalParams<'a>,
) -> Result<LocalParams<'a>, LocalParamsError> {
    match cbor {
        None | Some(Item::Null) => Ok(build(arena, &[], &[], base.refs())?),
        Some(Item::String(name)) => {
            let found = dictionary
                .get(*name)
                .ok_or_else(|| LocalParamsError::UnknownReference((*name).to_string()))?;
            Ok(build(arena, found.ints(), found.blobs(), base.refs())?)
        }
        Some(Item::Map(_)) => {
            let (ints, blobs) = parse_inline(cbor.unwrap())?;
            Ok(build(arena, &ints, &blobs, base.refs())?)
        }
        _ => Err(LocalParamsError::InvalidShape),
    }
}

fn parse_inline<'c>(item: &Item<'c>) -> Result<(Vec<IntParam>, Vec<BlobParam<'c>>), LocalParamsError> {
    let mut ints = Vec::new();
    let mut blobs = Vec::new();

    if let Some(node) = item.map_get("ints") {
        for pair in node.as_map().ok_or(LocalParamsError::MalformedInt)? {
            let id = pair.key.as_int().ok_or(LocalParamsError::MalformedInt)?;
            let value = pair.value.as_int().ok_or(LocalParamsError::MalformedInt)?;
            ints.push(IntParam { id, value });
        }
    }
    if let Some(node) = item.map_get("blobs") {
        for pair in node.as_map().ok_or(LocalParamsError::MalformedBlob)? {
            let id = pair.key.as_int().ok_or(LocalParamsError::MalformedBlob)?;
            let value = pair.value.as_bytes().ok_or(LocalParamsError::MalformedBlob)?;
            blobs.push(BlobParam { id, value });
        }
    }
    Ok((ints, blobs))
}
