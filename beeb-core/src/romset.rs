//! ROM set loading from ZIP files with manifest support.
//!
//! A ROM set is a ZIP file of 6502 images and an optional `manifest.json`
//! describing where each image goes and which personality to run. Without
//! a manifest every file is treated as a sideways ROM, in archive order.

use std::io::{Read, Seek};
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};
use zip::ZipArchive;

use crate::console::HostConsole;
use crate::emulator::BeebEmulator;
use crate::error::{EmuError, EmuResult};
use crate::personality::ModeRequest;

const MANIFEST_NAME: &str = "MANIFEST.JSON";

/// Image entry in a ROM set manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageEntry {
    pub src: String,
    /// Hex address for a raw load, e.g. "0xF800".
    #[serde(default)]
    pub load_address: Option<String>,
    /// Sideways bank to load into, bypassing the window.
    #[serde(default)]
    pub bank: Option<u8>,
}

/// ROM set manifest schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RomSetManifest {
    pub name: String,
    /// "standalone" or "tube".
    #[serde(default)]
    pub mode: Option<String>,
    /// Tube start-up command.
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub images: Vec<ImageEntry>,
}

/// Where one image ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Raw load at an address.
    Address(u16),
    /// Straight into a sideways bank.
    Bank(u8),
    /// Loaded at 0x8000 and copied to the next free bank.
    Sideways,
}

/// A resolved image, ready to load.
#[derive(Debug, Clone)]
pub struct RomImage {
    pub name: String,
    pub placement: Placement,
    pub data: Vec<u8>,
}

/// Loaded ROM set.
#[derive(Debug, Clone)]
pub struct RomSet {
    pub manifest: RomSetManifest,
    pub images: Vec<RomImage>,
}

impl RomSet {
    /// Fold the manifest's mode and command into what the user asked for.
    /// Conflicts are left for `ModeRequest::resolve` to report.
    pub fn merge_into(&self, request: &mut ModeRequest) -> EmuResult<()> {
        match self.manifest.mode.as_deref() {
            Some("standalone") => request.standalone = true,
            Some("tube") => request.tube = true,
            Some(other) => {
                return Err(EmuError::RomSet(format!("unknown mode '{}'", other)));
            }
            None => {}
        }
        if request.startup_command.is_none() {
            request.startup_command = self.manifest.command.clone();
        }
        Ok(())
    }

    /// Load every image into the emulator in manifest order.
    pub fn load_into<C: HostConsole>(&self, emu: &mut BeebEmulator<C>) -> EmuResult<()> {
        for image in &self.images {
            match image.placement {
                Placement::Address(address) => emu.load_at(address, &image.data),
                Placement::Bank(bank) => emu.load_bank(bank, &image.data)?,
                Placement::Sideways => {
                    emu.load_sideways_image(&image.data)?;
                }
            }
            debug!("ROM set image '{}' -> {:?}", image.name, image.placement);
        }
        Ok(())
    }
}

/// Parse a hex address, with or without a `0x` or `&` prefix.
pub fn parse_address(text: &str) -> Option<u16> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .or_else(|| text.strip_prefix('&'))
        .unwrap_or(text);
    u16::from_str_radix(digits, 16).ok()
}

fn is_manifest(name: &str) -> bool {
    let upper = name.to_uppercase();
    upper == MANIFEST_NAME || upper.ends_with(&format!("/{}", MANIFEST_NAME))
}

/// Final path component, upper-cased for matching.
fn file_key(name: &str) -> String {
    name.rsplit('/').next().unwrap_or(name).to_uppercase()
}

/// Load a ROM set from ZIP data.
pub fn load_romset<R: Read + Seek>(reader: R) -> EmuResult<RomSet> {
    let mut archive = ZipArchive::new(reader)?;
    let mut files: Vec<(String, Vec<u8>)> = Vec::new();
    let mut manifest: Option<RomSetManifest> = None;

    // Extract all files
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }

        let name = file.name().to_string();
        let mut content = Vec::new();
        file.read_to_end(&mut content)?;

        if is_manifest(&name) {
            manifest = Some(serde_json::from_slice(&content)?);
        } else {
            files.push((name, content));
        }
    }

    let Some(manifest) = manifest else {
        // No manifest: everything is a sideways ROM
        let images = files
            .into_iter()
            .map(|(name, data)| RomImage {
                name,
                placement: Placement::Sideways,
                data,
            })
            .collect();
        return Ok(RomSet {
            manifest: RomSetManifest {
                name: "Unnamed ROM set".to_string(),
                mode: None,
                command: None,
                images: Vec::new(),
            },
            images,
        });
    };

    let mut images = Vec::with_capacity(manifest.images.len());
    for entry in &manifest.images {
        let key = file_key(&entry.src);
        let data = files
            .iter()
            .find(|(name, _)| file_key(name) == key)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| EmuError::RomSet(format!("missing image '{}'", entry.src)))?;

        let placement = match (&entry.load_address, entry.bank) {
            (_, Some(bank)) => Placement::Bank(bank),
            (Some(text), None) => Placement::Address(parse_address(text).ok_or_else(|| {
                EmuError::RomSet(format!("bad load address '{}' for '{}'", text, entry.src))
            })?),
            (None, None) => Placement::Sideways,
        };

        images.push(RomImage {
            name: entry.src.clone(),
            placement,
            data,
        });
    }

    Ok(RomSet { manifest, images })
}

/// Load a ROM set from a file path.
pub fn load_romset_from_path(path: impl AsRef<Path>) -> EmuResult<RomSet> {
    let file = std::fs::File::open(path)?;
    load_romset(file)
}
