//! Standalone `xenc:ReferenceList` handling

use crate::chain::{Position, ProcessorContext};
use crate::decrypt::{DecryptProcessor, KeySource};
use crate::error::Result;
use crate::parser::{XmlElement, parse_reference_list};
use super::HeaderElement;
use tracing::debug;

/// Bind a header-level reference list to a new decrypt processor
///
/// There is no enclosing key here; each referenced `xenc:EncryptedData`
/// locates its key through its own `ds:KeyInfo`.
pub fn handle_reference_list(
    element: HeaderElement<'_>,
    ctx: &mut ProcessorContext<'_>,
) -> Result<()> {
    let list = parse_reference_list(&XmlElement::from_events(element.events)?)?;
    if list.data_references.is_empty() {
        return Ok(());
    }
    debug!(references = list.data_references.len(), "binding standalone reference list");
    ctx.insert_processor(
        Box::new(
            DecryptProcessor::new(list, KeySource::PerElement)
                .with_ancestor_scopes(element.ancestor_scopes.to_vec()),
        ),
        Position::AfterCurrent,
    );
    Ok(())
}
