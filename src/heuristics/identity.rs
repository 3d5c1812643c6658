//! Declared extension versus sniffed format

use crate::common::SniffedType;

/// Extensions that name the same format
const ALIASES: &[(&str, &str)] = &[("jpeg", "jpg"), ("tiff", "tif")];

fn canonical(ext: &str) -> String {
    let lower = ext.trim_start_matches('.').to_lowercase();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, canon)| canon.to_string())
        .unwrap_or(lower)
}

/// File-type consistency sentence. None unless the sniffer recognised the
/// content and the declared name carries an extension.
pub fn assess_identity(declared_name: &str, sniffed: &SniffedType) -> Option<String> {
    if !sniffed.detected {
        return None;
    }
    let detected = sniffed.extension.as_deref()?;
    let declared = crate::source::extension_of(declared_name)?;

    if canonical(&declared) == canonical(detected) {
        Some(format!(
            "The declared file extension (.{declared}) is consistent with the internally detected file format ({detected}). \
No structural inconsistency was identified based on binary signature analysis."
        ))
    } else {
        Some(format!(
            "The declared file extension (.{declared}) does not correspond with the internally detected file format ({detected}). \
This inconsistency may indicate extension modification, file renaming, or potential format obfuscation."
        ))
    }
}
