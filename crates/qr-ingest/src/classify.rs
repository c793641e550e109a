//! Fragment classification
//!
//! Classification is a pure prefix/shape inspection of the raw scanned text.
//! It never fails: anything that is not recognisably part of a multi-part
//! transfer and does not probe as a base43 PSBT is plain text.

use crate::{base43, psbt, workload};

/// UR v2 types that are always treated as fountain-coded parts
pub const UR_V2_PREFIXES: [&str; 3] = ["UR:CRYPTO-ACCOUNT", "UR:CRYPTO-PSBT", "UR:CRYPTO-OUTPUT"];

/// BBQR header prefix
pub const BBQR_PREFIX: &str = "B$";

const UR_BYTES_PREFIX: &str = "UR:BYTES";

/// Fragment kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentKind {
    /// Literal text payload
    PlainText,
    /// Base43-encoded PSBT
    Base43Psbt,
    /// Legacy UR v1 part
    UrV1Part,
    /// UR v2 part
    UrV2Part,
    /// BBQR part
    BbqrPart,
    /// Looked like a multi-part fragment but could not be parsed
    Unrecognized,
}

impl FragmentKind {
    /// Get display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::PlainText => "plain-text",
            Self::Base43Psbt => "base43-psbt",
            Self::UrV1Part => "ur-v1",
            Self::UrV2Part => "ur-v2",
            Self::BbqrPart => "bbqr",
            Self::Unrecognized => "unrecognized",
        }
    }

    /// Kinds that complete the session on their own
    pub fn is_single_payload(&self) -> bool {
        matches!(self, Self::PlainText | Self::Base43Psbt)
    }

    /// Kinds that go through the ingestion queue
    pub fn is_multi_part(&self) -> bool {
        matches!(self, Self::UrV1Part | Self::UrV2Part | Self::BbqrPart)
    }
}

/// Classified fragment with kind-specific fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    /// Literal text payload
    PlainText,
    /// Base43 PSBT and its decoded bytes
    Base43Psbt {
        /// Decoded PSBT bytes
        psbt: Vec<u8>,
    },
    /// Legacy UR v1 part
    UrV1Part {
        /// 1-based part index
        index: u32,
        /// Announced part count
        total: u32,
    },
    /// UR v2 part
    UrV2Part,
    /// BBQR part
    BbqrPart,
    /// Unparseable multi-part fragment
    Unrecognized {
        /// Why the fragment was not usable
        reason: String,
    },
}

impl Classified {
    /// Get the fragment kind
    pub fn kind(&self) -> FragmentKind {
        match self {
            Self::PlainText => FragmentKind::PlainText,
            Self::Base43Psbt { .. } => FragmentKind::Base43Psbt,
            Self::UrV1Part { .. } => FragmentKind::UrV1Part,
            Self::UrV2Part => FragmentKind::UrV2Part,
            Self::BbqrPart => FragmentKind::BbqrPart,
            Self::Unrecognized { .. } => FragmentKind::Unrecognized,
        }
    }
}

fn starts_with_ignore_case(raw: &str, prefix: &str) -> bool {
    raw.len() >= prefix.len()
        && raw.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// `ur:bytes/<i>-<n>/<body>`: fountain-coded bytes, not a v1 workload
fn is_ur_v2_bytes(raw: &str) -> bool {
    let pieces: Vec<&str> = raw.split('/').collect();
    pieces.len() == 3 && pieces[1].contains('-')
}

/// Classify a raw scanned string
pub fn classify(raw: &str) -> Classified {
    if raw.is_empty() {
        return Classified::Unrecognized {
            reason: "empty fragment".to_string(),
        };
    }

    if UR_V2_PREFIXES
        .iter()
        .any(|prefix| starts_with_ignore_case(raw, prefix))
    {
        return Classified::UrV2Part;
    }

    if starts_with_ignore_case(raw, BBQR_PREFIX) {
        return Classified::BbqrPart;
    }

    if starts_with_ignore_case(raw, UR_BYTES_PREFIX) && is_ur_v2_bytes(raw) {
        return Classified::UrV2Part;
    }

    if starts_with_ignore_case(raw, "UR") {
        return match workload::extract_single_workload(raw) {
            Ok((index, total)) => Classified::UrV1Part { index, total },
            Err(e) => Classified::Unrecognized {
                reason: e.to_string(),
            },
        };
    }

    match base43::decode(raw) {
        Ok(bytes) if psbt::is_psbt(&bytes) => Classified::Base43Psbt { psbt: bytes },
        _ => Classified::PlainText,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ur_v2_prefixes() {
        assert_eq!(classify("UR:CRYPTO-PSBT/1-3/lpadaxcs"), Classified::UrV2Part);
        assert_eq!(classify("ur:crypto-account/oeadcyem"), Classified::UrV2Part);
        assert_eq!(classify("Ur:Crypto-Output/12-40/abc"), Classified::UrV2Part);
    }

    #[test]
    fn test_bbqr_prefix() {
        assert_eq!(classify("B$2P0300ABCDEF"), Classified::BbqrPart);
        assert_eq!(classify("b$HU0100"), Classified::BbqrPart);
    }

    #[test]
    fn test_ur_bytes_fountain_shape() {
        assert_eq!(classify("ur:bytes/1-3/lpadaxcsencylobemohsgmoyadtaadfwhl"), Classified::UrV2Part);
    }

    #[test]
    fn test_ur_v1_workloads() {
        assert_eq!(
            classify("UR:BYTES/1of2/68656c"),
            Classified::UrV1Part { index: 1, total: 2 }
        );
        assert_eq!(
            classify("ur:bytes/2of3/digest/body"),
            Classified::UrV1Part { index: 2, total: 3 }
        );
        assert_eq!(
            classify("ur:crypto-hdkey/body"),
            Classified::UrV1Part { index: 1, total: 1 }
        );
    }

    #[test]
    fn test_unparseable_ur_is_unrecognized() {
        let classified = classify("ur:bytes/5of2/digest/body");
        assert_eq!(classified.kind(), FragmentKind::Unrecognized);
        assert_eq!(classify("").kind(), FragmentKind::Unrecognized);
    }

    #[test]
    fn test_base43_psbt() {
        let psbt = psbt::sample_psbt();
        let encoded = base43::encode(&psbt);
        assert_eq!(classify(&encoded), Classified::Base43Psbt { psbt });
    }

    #[test]
    fn test_base43_non_psbt_is_plain_text() {
        // Valid base43, not a PSBT
        assert_eq!(classify("HELLO"), Classified::PlainText);
    }

    #[test]
    fn test_plain_text_fallthrough() {
        assert_eq!(classify("hello-world"), Classified::PlainText);
        assert_eq!(
            classify("bitcoin:bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq?amount=0.1"),
            Classified::PlainText
        );
        assert!(classify("hello-world").kind().is_single_payload());
    }

    #[test]
    fn test_kind_flags() {
        assert!(FragmentKind::BbqrPart.is_multi_part());
        assert!(FragmentKind::UrV1Part.is_multi_part());
        assert!(!FragmentKind::Unrecognized.is_multi_part());
        assert!(!FragmentKind::Unrecognized.is_single_payload());
        assert_eq!(FragmentKind::UrV2Part.name(), "ur-v2");
    }
}
