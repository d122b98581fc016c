//! # FMP capsule validator
//!
//! Parses a UEFI capsule holding a single authenticated Firmware Management
//! Protocol payload and checks every header field the update path relies
//! on. The first failed check makes the capsule invalid.

use sr_checker_base::guid::Guid;
use sr_checker_base::strategies::{
    CapsuleGuidStatus, CapsuleReport, CapsuleValidator, CollaboratorError, GuidLookup,
    GuidLookupResult,
};
use sr_config::log_debug;
use std::path::Path;
use std::sync::Arc;

pub const FMP_CAPSULE_GUID: &str = "6dcbd5ed-e82d-4c44-bda1-7194199ad92a";
pub const PKCS7_CERT_TYPE_GUID: &str = "4aafd29d-68df-49ee-8aa9-347d375665a7";

pub const CAPSULE_HEADER_SIZE: u32 = 28;
pub const CAPSULE_FLAGS_PERSIST_ACROSS_RESET: u32 = 0x10000;
pub const CAPSULE_FLAGS_POPULATE_SYSTEM_TABLE: u32 = 0x20000;
pub const CAPSULE_FLAGS_INITIATE_RESET: u32 = 0x40000;
pub const CAPSULE_SUPPORT_AUTHENTICATION: u64 = 0x1;
pub const CAPSULE_SUPPORT_DEPENDENCY: u64 = 0x2;
pub const WIN_CERT_TYPE_EFI_GUID: u16 = 0x0EF1;
pub const WIN_CERT_REVISION: u16 = 0x0200;

const MONOTONIC_COUNT_SIZE: u32 = 8;
const WIN_CERTIFICATE_SIZE: u32 = 8;
const GUID_SIZE: u32 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapsuleHeader {
    pub guid: Guid,
    pub header_size: u32,
    pub flags: u32,
    pub capsule_image_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FmpHeader {
    pub version: u32,
    pub embedded_driver_count: u16,
    pub payload_item_count: u16,
    pub item_offsets: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHeader {
    pub version: u32,
    pub update_image_type_id: Guid,
    pub update_image_index: u8,
    pub reserved: [u8; 3],
    pub update_image_size: u32,
    pub update_vendor_code_size: u32,
    pub update_hardware_instance: Option<u64>,
    pub image_capsule_support: Option<u64>,
}

/// `EFI_FIRMWARE_IMAGE_AUTHENTICATION`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAuthentication {
    pub monotonic_count: u64,
    pub length: u32,
    pub revision: u16,
    pub certificate_type: u16,
    pub cert_type: Guid,
    pub cert_data_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FmpCapsule {
    pub header: CapsuleHeader,
    pub fmp: FmpHeader,
    pub image: ImageHeader,
    pub authentication: Option<ImageAuthentication>,
    pub firmware_image_size: usize,
    pub remaining_bytes: usize,
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8], String> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| format!("truncated {} at offset {}", what, self.pos))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N], String> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    fn u8(&mut self, what: &str) -> Result<u8, String> {
        Ok(self.array::<1>(what)?[0])
    }

    fn u16(&mut self, what: &str) -> Result<u16, String> {
        Ok(u16::from_le_bytes(self.array(what)?))
    }

    fn u32(&mut self, what: &str) -> Result<u32, String> {
        Ok(u32::from_le_bytes(self.array(what)?))
    }

    fn u64(&mut self, what: &str) -> Result<u64, String> {
        Ok(u64::from_le_bytes(self.array(what)?))
    }

    fn guid(&mut self, what: &str) -> Result<Guid, String> {
        Guid::from_bytes(self.take(GUID_SIZE as usize, what)?).map_err(|e| e.to_string())
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }
}

fn size_after(total: u32, minus: u32, what: &str) -> Result<usize, String> {
    total
        .checked_sub(minus)
        .map(|n| n as usize)
        .ok_or_else(|| format!("{} {} too small", what, total))
}

/// Decode the capsule layout; no field value is judged here
pub fn parse_capsule(bytes: &[u8]) -> Result<FmpCapsule, String> {
    let mut r = Reader::new(bytes);

    let header = CapsuleHeader {
        guid: r.guid("CapsuleGuid")?,
        header_size: r.u32("HeaderSize")?,
        flags: r.u32("Flags")?,
        capsule_image_size: r.u32("CapsuleImageSize")?,
    };
    r.take(
        size_after(header.header_size, CAPSULE_HEADER_SIZE, "HeaderSize")?,
        "header padding",
    )?;

    let version = r.u32("FMP Version")?;
    let embedded_driver_count = r.u16("EmbeddedDriverCount")?;
    let payload_item_count = r.u16("PayloadItemCount")?;
    let item_offsets = (0..embedded_driver_count as usize + payload_item_count as usize)
        .map(|_| r.u64("ItemOffsetList"))
        .collect::<Result<Vec<_>, _>>()?;
    let fmp = FmpHeader {
        version,
        embedded_driver_count,
        payload_item_count,
        item_offsets,
    };

    let version = r.u32("image Version")?;
    let image = ImageHeader {
        version,
        update_image_type_id: r.guid("UpdateImageTypeId")?,
        update_image_index: r.u8("UpdateImageIndex")?,
        reserved: r.array("reserved bytes")?,
        update_image_size: r.u32("UpdateImageSize")?,
        update_vendor_code_size: r.u32("UpdateVendorCodeSize")?,
        update_hardware_instance: if version >= 2 {
            Some(r.u64("UpdateHardwareInstance")?)
        } else {
            None
        },
        image_capsule_support: if version >= 3 {
            Some(r.u64("ImageCapsuleSupport")?)
        } else {
            None
        },
    };

    let authenticated = image
        .image_capsule_support
        .map_or(true, |support| support & CAPSULE_SUPPORT_AUTHENTICATION != 0);

    let (authentication, firmware_image_size) = if authenticated {
        let monotonic_count = r.u64("MonotonicCount")?;
        let length = r.u32("dwLength")?;
        let revision = r.u16("wRevision")?;
        let certificate_type = r.u16("wCertificateType")?;
        let cert_type = r.guid("CertType")?;
        let cert_data_size = size_after(length, WIN_CERTIFICATE_SIZE + GUID_SIZE, "dwLength")?;
        r.take(cert_data_size, "CertData")?;
        let firmware_image_size = size_after(
            image.update_image_size,
            MONOTONIC_COUNT_SIZE.saturating_add(length),
            "UpdateImageSize",
        )?;
        (
            Some(ImageAuthentication {
                monotonic_count,
                length,
                revision,
                certificate_type,
                cert_type,
                cert_data_size,
            }),
            firmware_image_size,
        )
    } else {
        (None, image.update_image_size as usize)
    };
    r.take(firmware_image_size, "FirmwareImage")?;

    Ok(FmpCapsule {
        header,
        fmp,
        image,
        authentication,
        firmware_image_size,
        remaining_bytes: r.remaining(),
    })
}

fn known_guid(text: &str) -> Result<Guid, String> {
    text.parse().map_err(|e| format!("{}", e))
}

/// Field checks in layout order; the first failure is returned
pub fn sanity_check(capsule: &FmpCapsule) -> Result<(), String> {
    let h = &capsule.header;
    if h.guid != known_guid(FMP_CAPSULE_GUID)? {
        return Err(format!("Bad capsule GUID {}, not {}!", h.guid, FMP_CAPSULE_GUID));
    }
    if h.header_size < CAPSULE_HEADER_SIZE {
        return Err(format!("Bad HeaderSize {}!", h.header_size));
    }
    let allowed_flags = CAPSULE_FLAGS_PERSIST_ACROSS_RESET
        | CAPSULE_FLAGS_POPULATE_SYSTEM_TABLE
        | CAPSULE_FLAGS_INITIATE_RESET;
    if h.flags & !allowed_flags != 0 {
        return Err(format!("Bad Flags {:#x}!", h.flags));
    }
    if h.capsule_image_size < CAPSULE_HEADER_SIZE {
        return Err(format!("Bad CapsuleImageSize {}!", h.capsule_image_size));
    }

    let f = &capsule.fmp;
    if f.version != 1 {
        return Err(format!("Unknown Version {}, not 1!", f.version));
    }
    if f.embedded_driver_count != 0 {
        return Err(format!(
            "Non-zero EmbeddedDriverCount {}; not implemented!",
            f.embedded_driver_count
        ));
    }
    if f.payload_item_count != 1 {
        return Err(format!(
            "{} payload item(s), not exactly one; not implemented!",
            f.payload_item_count
        ));
    }

    let i = &capsule.image;
    if i.version != 3 {
        return Err(format!("Bad Version {}, not 3!", i.version));
    }
    if i.reserved != [0, 0, 0] {
        return Err(format!("Non-zero reserved_bytes {:?}!", i.reserved));
    }
    if i.update_image_size <= 32 {
        return Err(format!("Invalid UpdateImageSize {}!", i.update_image_size));
    }
    if i.update_vendor_code_size != 0 {
        return Err(format!(
            "Non-zero UpdateVendorCodeSize {}; not implemented!",
            i.update_vendor_code_size
        ));
    }
    let support = i.image_capsule_support.unwrap_or(0);
    if support & !(CAPSULE_SUPPORT_AUTHENTICATION | CAPSULE_SUPPORT_DEPENDENCY) != 0 {
        return Err(format!("Invalid ImageCapsuleSupport {:#x}!", support));
    }
    if support & CAPSULE_SUPPORT_DEPENDENCY != 0 {
        return Err(format!(
            "Dependencies not implemented! (ImageCapsuleSupport: {:#x})",
            support
        ));
    }
    if support & CAPSULE_SUPPORT_AUTHENTICATION == 0 {
        return Err(format!(
            "Missing authentication flag! (ImageCapsuleSupport: {:#x})",
            support
        ));
    }

    let a = capsule
        .authentication
        .as_ref()
        .ok_or_else(|| "Missing image authentication!".to_string())?;
    if a.length < 9 {
        return Err(format!("dwLength {} < 9, too small!", a.length));
    }
    if a.revision != WIN_CERT_REVISION {
        return Err(format!("Unknown wRevision {:#x} not 0x200!", a.revision));
    }
    if a.certificate_type != WIN_CERT_TYPE_EFI_GUID {
        return Err(format!(
            "Missing WIN_CERT_TYPE_EFI_GUID! (wCertificateType: {:#x})",
            a.certificate_type
        ));
    }
    if a.cert_type != known_guid(PKCS7_CERT_TYPE_GUID)? {
        return Err(format!(
            "Missing EFI_CERT_TYPE_PKCS7_GUID! (CertType: {})",
            a.cert_type
        ));
    }

    if capsule.remaining_bytes != 0 {
        return Err(format!("Remaining {} byte(s)!", capsule.remaining_bytes));
    }
    Ok(())
}

pub struct FmpCapsuleValidator {
    guids: Arc<dyn GuidLookup>,
}

impl FmpCapsuleValidator {
    pub fn new(guids: Arc<dyn GuidLookup>) -> Self {
        Self { guids }
    }
}

impl CapsuleValidator for FmpCapsuleValidator {
    fn validate(&self, path: &Path) -> Result<CapsuleReport, CollaboratorError> {
        let bytes = std::fs::read(path).map_err(|e| CollaboratorError::io(path, e))?;
        let capsule = parse_capsule(&bytes).map_err(|reason| CollaboratorError::InvalidData {
            path: path.to_path_buf(),
            reason,
        })?;
        log_debug!(
            "Parsed capsule",
            "path" => path.display(),
            "image_type" => capsule.image.update_image_type_id,
            "firmware_bytes" => capsule.firmware_image_size
        );

        if let Err(reason) = sanity_check(&capsule) {
            return Ok(CapsuleReport {
                valid: false,
                authenticated: capsule.authentication.is_some(),
                image_type_guid: Some(capsule.image.update_image_type_id),
                guid_status: CapsuleGuidStatus::Inconclusive("capsule not validated".to_string()),
                warnings: vec![reason],
            });
        }

        let guid = capsule.image.update_image_type_id;
        let guid_status = match self.guids.lookup(&guid) {
            Ok(GuidLookupResult::Known(description)) => CapsuleGuidStatus::Known(description),
            Ok(GuidLookupResult::Unknown) => CapsuleGuidStatus::Unknown,
            Err(e) => CapsuleGuidStatus::Inconclusive(e.to_string()),
        };

        Ok(CapsuleReport {
            valid: true,
            authenticated: true,
            image_type_guid: Some(guid),
            guid_status,
            warnings: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executors::guid_database::GuidDatabase;
    use assert_matches::assert_matches;

    const IMAGE_TYPE: &str = "1ed4b7a7-5a7e-4e5f-a2c4-3fc4f1d4b3a1";

    struct Layout {
        header_size: u32,
        flags: u32,
        support: u64,
        cert_len: u32,
        firmware_len: u32,
        trailing: usize,
    }

    impl Default for Layout {
        fn default() -> Self {
            Self {
                header_size: 32,
                flags: CAPSULE_FLAGS_PERSIST_ACROSS_RESET | CAPSULE_FLAGS_INITIATE_RESET,
                support: CAPSULE_SUPPORT_AUTHENTICATION,
                cert_len: 4,
                firmware_len: 8,
                trailing: 0,
            }
        }
    }

    fn guid_bytes(text: &str) -> Vec<u8> {
        text.parse::<Guid>().unwrap().as_bytes().to_vec()
    }

    fn build(layout: &Layout) -> Vec<u8> {
        let dw_length = WIN_CERTIFICATE_SIZE + GUID_SIZE + layout.cert_len;
        let update_image_size = MONOTONIC_COUNT_SIZE + dw_length + layout.firmware_len;

        let mut body = Vec::new();
        body.extend(1u32.to_le_bytes());
        body.extend(0u16.to_le_bytes());
        body.extend(1u16.to_le_bytes());
        body.extend(16u64.to_le_bytes());

        body.extend(3u32.to_le_bytes());
        body.extend(guid_bytes(IMAGE_TYPE));
        body.push(1);
        body.extend([0u8; 3]);
        body.extend(update_image_size.to_le_bytes());
        body.extend(0u32.to_le_bytes());
        body.extend(0u64.to_le_bytes());
        body.extend(layout.support.to_le_bytes());

        body.extend(1u64.to_le_bytes());
        body.extend(dw_length.to_le_bytes());
        body.extend(WIN_CERT_REVISION.to_le_bytes());
        body.extend(WIN_CERT_TYPE_EFI_GUID.to_le_bytes());
        body.extend(guid_bytes(PKCS7_CERT_TYPE_GUID));
        body.extend(vec![0x30; layout.cert_len as usize]);
        body.extend(vec![0xaa; layout.firmware_len as usize]);
        body.extend(vec![0u8; layout.trailing]);

        let mut bytes = guid_bytes(FMP_CAPSULE_GUID);
        bytes.extend(layout.header_size.to_le_bytes());
        bytes.extend(layout.flags.to_le_bytes());
        let total = layout.header_size as usize + body.len();
        bytes.extend((total as u32).to_le_bytes());
        bytes.extend(vec![0u8; (layout.header_size - CAPSULE_HEADER_SIZE) as usize]);
        bytes.extend(body);
        bytes
    }

    fn validator(db: &str) -> FmpCapsuleValidator {
        FmpCapsuleValidator::new(Arc::new(GuidDatabase::from_str("db", db).unwrap()))
    }

    fn validate(layout: &Layout, db: &str) -> Result<CapsuleReport, CollaboratorError> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capsule.bin");
        std::fs::write(&path, build(layout)).unwrap();
        validator(db).validate(&path)
    }

    #[test]
    fn test_parse_layout() {
        let capsule = parse_capsule(&build(&Layout::default())).unwrap();
        assert_eq!(capsule.header.header_size, 32);
        assert_eq!(capsule.fmp.item_offsets, vec![16]);
        assert_eq!(capsule.image.update_image_type_id.to_string(), IMAGE_TYPE);
        assert_eq!(capsule.image.image_capsule_support, Some(1));
        assert_eq!(capsule.authentication.as_ref().unwrap().cert_data_size, 4);
        assert_eq!(capsule.firmware_image_size, 8);
        assert_eq!(capsule.remaining_bytes, 0);
        assert_eq!(sanity_check(&capsule), Ok(()));
    }

    #[test]
    fn test_valid_capsule_unknown_guid() {
        let report = validate(&Layout::default(), "").unwrap();
        assert!(report.valid && report.authenticated);
        assert_eq!(report.image_type_guid.unwrap().to_string(), IMAGE_TYPE);
        assert_eq!(report.guid_status, CapsuleGuidStatus::Unknown);
    }

    #[test]
    fn test_valid_capsule_known_guid() {
        let db = format!(
            "guid-tool-database:\nknown-guids:\n  - guid: {}\n    description: Sample image\n",
            IMAGE_TYPE
        );
        let report = validate(&Layout::default(), &db).unwrap();
        assert_eq!(report.guid_status, CapsuleGuidStatus::Known("Sample image".to_string()));
    }

    #[test]
    fn test_bad_flags() {
        let layout = Layout {
            flags: 0x1,
            ..Layout::default()
        };
        let report = validate(&layout, "").unwrap();
        assert!(!report.valid);
        assert_eq!(report.warnings, vec!["Bad Flags 0x1!".to_string()]);
    }

    #[test]
    fn test_missing_authentication_flag() {
        let layout = Layout {
            support: 0,
            ..Layout::default()
        };
        // Without the flag the authentication block is read as firmware image
        let report = validate(&layout, "").unwrap();
        assert!(!report.valid);
        assert!(report.warnings[0].starts_with("Missing authentication flag"));
    }

    #[test]
    fn test_trailing_bytes() {
        let layout = Layout {
            trailing: 3,
            ..Layout::default()
        };
        let report = validate(&layout, "").unwrap();
        assert_eq!(report.warnings, vec!["Remaining 3 byte(s)!".to_string()]);
    }

    #[test]
    fn test_truncated_capsule() {
        let mut bytes = build(&Layout::default());
        bytes.truncate(60);
        assert!(parse_capsule(&bytes).unwrap_err().starts_with("truncated"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.bin");
        std::fs::write(&path, &bytes).unwrap();
        assert_matches!(
            validator("").validate(&path),
            Err(CollaboratorError::InvalidData { .. })
        );
    }

    #[test]
    fn test_small_header_size() {
        let mut bytes = build(&Layout::default());
        bytes[16..20].copy_from_slice(&20u32.to_le_bytes());
        assert!(parse_capsule(&bytes).unwrap_err().contains("HeaderSize"));
    }
}
