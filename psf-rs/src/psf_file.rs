use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::byte_cursor::ByteCursor;
use crate::error::PsfError;
use crate::header_section::HeaderSection;
use crate::property::{Properties, PropertyValue};
use crate::psf_xl::XlSidecar;
use crate::section::{SectionInfo, SectionKind};
use crate::signal_def::SignalDef;
use crate::sweep_section::SweepSection;
use crate::trace_section::TraceSection;
use crate::type_def::TypeDef;
use crate::type_section::TypeSection;
use crate::value_section::{SimpleValueSection, SweepValueSection, SweptValues, Value};
use crate::waveform::{Samples, Waveform};

/// The two PSF encodings: the tagged binary container handled by this
/// crate, and the ASCII "logFile" form handled by a separate text decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Ascii,
    Binary,
}

/// Selects the decoder from the leading bytes of a file: ASCII results
/// start with the literal `HEADER`, everything else is binary PSF.
pub fn detect_format(bytes: &[u8]) -> FileFormat {
    if bytes.len() >= 6 && &bytes[..6] == b"HEADER" {
        FileFormat::Ascii
    } else {
        FileFormat::Binary
    }
}

/// What `get_signal` hands back: a literal for non-swept files, a waveform
/// for swept and PSF-XL files.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Value(Value),
    Waveform(Waveform),
}

impl Signal {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Signal::Value(v) => Some(v),
            Signal::Waveform(_) => None,
        }
    }

    pub fn as_waveform(&self) -> Option<&Waveform> {
        match self {
            Signal::Waveform(w) => Some(w),
            Signal::Value(_) => None,
        }
    }
}

/// The common surface of PSF result decoders.
///
/// The binary decoder in this crate and the external ASCII decoder both
/// expose results through this trait, so callers can stay agnostic of the
/// on-disk encoding.
pub trait SignalFile {
    /// A copy of the Header section properties.
    fn header(&self) -> &Properties;
    /// The sweep variable's properties plus its name under `name`; `None`
    /// for non-swept files.
    fn sweep_info(&self) -> Option<Properties>;
    /// Flattened signal names in declaration order.
    fn names(&self) -> Vec<String>;
    /// Properties describing one signal.
    fn signal_info(&self, name: &str) -> Result<Properties, PsfError>;
    /// Fetches one signal by name.
    fn get_signal(&self, name: &str) -> Result<Signal, PsfError>;
    /// Fetches several signals; for PSF-XL files the sidecar is opened once
    /// for the whole batch.
    fn get_signals(&self, names: &[&str]) -> Result<HashMap<String, Signal>, PsfError>;
}

const VALID_SIGNATURES: [u32; 4] = [0x200, 0x300, 0x400, 0x500];

/// An open binary PSF result file.
///
/// `PsfBinFile` is the entry point for reading simulation results. It
/// parses the whole file at open time and exposes the contained signals as
/// named values or waveforms.
///
/// ```no_run
/// use psf_rs::{PsfBinFile, Signal};
///
/// let file = PsfBinFile::open("path/to/dc.dc").unwrap();
/// for name in file.names() {
///     println!("signal: {name}");
/// }
/// match file.get_signal("vout").unwrap() {
///     Signal::Waveform(wfm) => println!("{} points", wfm.len()),
///     Signal::Value(value) => println!("operating point: {value:?}"),
/// }
/// ```
///
/// # Layouts
/// Three on-disk layouts are handled transparently: non-swept files with a
/// literal per signal, swept files with flat or windowed sample records,
/// and PSF-XL index files whose data lives in a compressed `.psfxl`
/// sidecar next to the primary file. The sidecar is only opened when a
/// signal is fetched.
///
/// # Concurrency
/// All contained data is immutable after `open` returns, so a `PsfBinFile`
/// can be shared between threads for reading.
#[derive(Debug)]
pub struct PsfBinFile {
    path: PathBuf,
    header: Properties,
    is_sweep: bool,
    is_psfxl_index: bool,
    npoints: usize,
    toc: HashMap<SectionKind, SectionInfo>,
    typedefs: HashMap<u32, TypeDef>,
    sweep: Option<SignalDef>,
    traces: Option<TraceSection>,
    simple: Option<SimpleValueSection>,
    swept: Option<SweptValues>,
}

impl PsfBinFile {
    /// Opens and fully parses a binary PSF file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PsfError> {
        let path = path.as_ref();
        info!("loading PSF file: {}", path.display());
        let bytes = fs::read(path)?;
        Self::from_bytes(path, &bytes)
    }

    /// Parses an in-memory file image. `path` is kept to locate the
    /// `.psfxl` sidecar of a PSF-XL index file.
    pub fn from_bytes<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<Self, PsfError> {
        let path = path.as_ref().to_path_buf();
        if detect_format(bytes) == FileFormat::Ascii {
            return Err(PsfError::AsciiFile(path));
        }

        let data = ByteCursor::new(bytes);
        let signature = data.get_u32(0)?;
        if !VALID_SIGNATURES.contains(&signature) {
            return Err(PsfError::BadSignature { offset: 0, signature });
        }

        // A 12-byte footer ending in "Clarissa" marks a fully indexed file;
        // without it the file is a PSF-XL index and has neither TOC nor
        // value section.
        let is_psfxl_index = !Self::has_footer(bytes);
        let toc = if is_psfxl_index {
            info!("no TOC found, assuming this is a PSF-XL index file");
            HashMap::new()
        } else {
            Self::read_toc(&data)?
        };

        let (header_section, mut rest) = if is_psfxl_index {
            HeaderSection::read(data.sub(4, data.len())?)?
        } else {
            HeaderSection::read(Self::toc_slice(&data, &toc, SectionKind::Header)?)?
        };
        let header = header_section.props;

        let is_sweep = header.get_int("PSF sweeps").unwrap_or(0) != 0;
        let npoints_raw = header.get_int("PSF sweep points").unwrap_or(0);
        if is_sweep && npoints_raw < 0 {
            return Err(PsfError::MalformedSection {
                offset: 0,
                message: format!("negative sweep point count {npoints_raw}"),
            });
        }
        let npoints = npoints_raw.max(0) as usize;
        let window_size = header.get_int("PSF window size").unwrap_or(0).max(0) as usize;
        let is_windowed = header.contains("PSF window size");

        let type_section = if is_psfxl_index {
            let (ts, tail) = TypeSection::read(rest)?;
            rest = tail;
            ts
        } else {
            let (ts, _) = TypeSection::read(Self::toc_slice(&data, &toc, SectionKind::Type)?)?;
            ts
        };
        let typedefs = type_section.typedefs;

        let mut sweep = None;
        if is_sweep {
            let (ss, tail) = if is_psfxl_index {
                SweepSection::read(rest, &typedefs)?
            } else {
                SweepSection::read(Self::toc_slice(&data, &toc, SectionKind::Sweep)?, &typedefs)?
            };
            if is_psfxl_index {
                rest = tail;
            }
            sweep = Some(ss.sweep);
        }

        let traces = if is_psfxl_index {
            let (ts, _) = TraceSection::read(rest, &typedefs)?;
            Some(ts)
        } else if toc.contains_key(&SectionKind::Trace) {
            let (ts, _) =
                TraceSection::read(Self::toc_slice(&data, &toc, SectionKind::Trace)?, &typedefs)?;
            Some(ts)
        } else {
            None
        };

        let mut simple = None;
        let mut swept = None;
        if !is_psfxl_index {
            let value_cursor = Self::toc_slice(&data, &toc, SectionKind::Value)?;
            if is_sweep {
                let sweep_def = sweep.as_ref().ok_or_else(|| PsfError::BadFooter {
                    offset: bytes.len().saturating_sub(12),
                    message: String::from("swept file without a Sweep section"),
                })?;
                let trace_section = traces.as_ref().ok_or_else(|| PsfError::BadFooter {
                    offset: bytes.len().saturating_sub(12),
                    message: String::from("swept file without a Trace section"),
                })?;
                let value_section = SweepValueSection::read(
                    value_cursor,
                    sweep_def,
                    trace_section,
                    &typedefs,
                    is_windowed,
                    window_size,
                    npoints,
                )?;
                swept = value_section.values;
            } else {
                simple = Some(SimpleValueSection::read(value_cursor, &typedefs)?);
            }
        }

        Ok(PsfBinFile {
            path,
            header,
            is_sweep,
            is_psfxl_index,
            npoints,
            toc,
            typedefs,
            sweep,
            traces,
            simple,
            swept,
        })
    }

    fn has_footer(bytes: &[u8]) -> bool {
        bytes.len() >= 12 && &bytes[bytes.len() - 12..bytes.len() - 4] == b"Clarissa"
    }

    /// The slice of one TOC-indexed section.
    fn toc_slice<'a>(
        data: &ByteCursor<'a>,
        toc: &HashMap<SectionKind, SectionInfo>,
        kind: SectionKind,
    ) -> Result<ByteCursor<'a>, PsfError> {
        let info = toc.get(&kind).ok_or_else(|| PsfError::BadFooter {
            offset: data.len().saturating_sub(12),
            message: format!("missing {kind:?} section"),
        })?;
        data.sub(info.offset, info.offset + info.size)
    }

    /// Scans the footer-anchored table of contents.
    ///
    /// The last int32 is the combined size of the sections; the TOC is the
    /// run of 8-byte (kind, offset) entries between the sections and the
    /// 12-byte footer.
    fn read_toc(data: &ByteCursor) -> Result<HashMap<SectionKind, SectionInfo>, PsfError> {
        let len = data.len();
        let data_size = data.get_u32(len - 4)? as usize;
        let toc_bytes = (len - 12)
            .checked_sub(data_size)
            .ok_or_else(|| PsfError::BadFooter {
                offset: len - 4,
                message: format!("data size {data_size} exceeds the file"),
            })?;
        if toc_bytes % 8 != 0 {
            return Err(PsfError::BadFooter {
                offset: len - 4,
                message: format!("non-integral TOC entry count ({toc_bytes} bytes)"),
            });
        }
        let nsections = toc_bytes / 8;
        let toc_start = len - 12 - 8 * nsections;

        let mut kinds = Vec::with_capacity(nsections);
        let mut offsets = Vec::with_capacity(nsections + 1);
        for s in 0..nsections {
            let entry_offset = toc_start + 8 * s;
            let raw_kind = data.get_u32(entry_offset)?;
            let kind = SectionKind::from_u32(raw_kind).ok_or_else(|| PsfError::BadFooter {
                offset: entry_offset,
                message: format!("unknown section kind {raw_kind}"),
            })?;
            let offset = data.get_u32(entry_offset + 4)? as usize;
            if offset > toc_start {
                return Err(PsfError::BadFooter {
                    offset: entry_offset + 4,
                    message: format!("section offset {offset:#x} outside the data area"),
                });
            }
            kinds.push(kind);
            offsets.push(offset);
        }
        // The TOC start bounds the last section.
        offsets.push(toc_start);

        let mut toc = HashMap::new();
        info!("sections are:");
        for s in 0..nsections {
            if offsets[s + 1] < offsets[s] {
                return Err(PsfError::BadFooter {
                    offset: toc_start + 8 * s,
                    message: String::from("section offsets out of order"),
                });
            }
            let entry = SectionInfo {
                kind: kinds[s],
                offset: offsets[s],
                size: offsets[s + 1] - offsets[s],
            };
            info!("    {:?} at {:#x} ({} bytes)", entry.kind, entry.offset, entry.size);
            toc.insert(kinds[s], entry);
        }
        Ok(toc)
    }

    /// Whether the file is swept (the header declares `PSF sweeps` ≠ 0).
    pub fn is_sweep(&self) -> bool {
        self.is_sweep
    }

    /// Whether the file is a PSF-XL index whose data lives in a sidecar.
    pub fn is_psfxl_index(&self) -> bool {
        self.is_psfxl_index
    }

    /// The `PSF sweep points` header value (0 for non-swept files).
    pub fn sweep_points(&self) -> usize {
        self.npoints
    }

    pub fn header(&self) -> &Properties {
        &self.header
    }

    pub fn sweep_info(&self) -> Option<Properties> {
        let sweep = self.sweep.as_ref()?;
        let mut info = sweep.properties.clone();
        info.set("name", PropertyValue::Str(sweep.name.clone()));
        Some(info)
    }

    pub fn names(&self) -> Vec<String> {
        if self.toc.contains_key(&SectionKind::Trace) {
            // fully indexed swept file
            self.traces.as_ref().map(TraceSection::names).unwrap_or_default()
        } else if let Some(simple) = &self.simple {
            simple.names()
        } else if let Some(traces) = &self.traces {
            // PSF-XL index file
            traces.names()
        } else {
            Vec::new()
        }
    }

    fn typedef_of(&self, signal: &SignalDef) -> Result<&TypeDef, PsfError> {
        // The reference was validated when the signal was parsed.
        self.typedefs.get(&signal.type_ref).ok_or(PsfError::UnknownType {
            offset: 0,
            type_ref: signal.type_ref,
        })
    }

    pub fn signal_info(&self, name: &str) -> Result<Properties, PsfError> {
        if self.is_psfxl_index {
            let traces = self.traces.as_ref().ok_or_else(|| unknown_name(name))?;
            let signal = traces.lookup(name).ok_or_else(|| unknown_name(name))?;
            return Ok(signal.properties.clone());
        }
        let signal_typedef = if self.is_sweep {
            let traces = self.traces.as_ref().ok_or_else(|| unknown_name(name))?;
            let signal = traces.lookup(name).ok_or_else(|| unknown_name(name))?;
            self.typedef_of(signal)?
        } else {
            let simple = self.simple.as_ref().ok_or_else(|| unknown_name(name))?;
            let entry = simple.lookup(name).ok_or_else(|| unknown_name(name))?;
            self.typedefs.get(&entry.type_ref).ok_or(PsfError::UnknownType {
                offset: 0,
                type_ref: entry.type_ref,
            })?
        };
        let mut info = signal_typedef.properties.clone();
        info.set("NAME", PropertyValue::Str(signal_typedef.name.clone()));
        Ok(info)
    }

    fn sweep_units(&self) -> String {
        self.sweep
            .as_ref()
            .and_then(|s| {
                s.properties.get_str("units").or_else(|| {
                    self.typedefs.get(&s.type_ref).and_then(|td| td.properties.get_str("units"))
                })
            })
            .unwrap_or("-")
            .to_owned()
    }

    fn signal_units(&self, signal: &SignalDef) -> String {
        self.typedefs
            .get(&signal.type_ref)
            .and_then(|td| td.properties.get_str("units"))
            .or_else(|| signal.properties.get_str("units"))
            .unwrap_or("-")
            .to_owned()
    }

    pub fn get_signal(&self, name: &str) -> Result<Signal, PsfError> {
        if self.is_psfxl_index {
            let sidecar = XlSidecar::open(&self.path)?;
            return Ok(Signal::Waveform(self.xl_waveform(&sidecar, name)?));
        }
        if self.is_sweep {
            return Ok(Signal::Waveform(self.swept_waveform(name)?));
        }
        let simple = self.simple.as_ref().ok_or_else(|| unknown_name(name))?;
        let entry = simple.lookup(name).ok_or_else(|| unknown_name(name))?;
        Ok(Signal::Value(entry.value.clone()))
    }

    pub fn get_signals(&self, names: &[&str]) -> Result<HashMap<String, Signal>, PsfError> {
        let mut result = HashMap::new();
        if self.is_psfxl_index {
            // One sidecar open amortized over the whole batch.
            let sidecar = XlSidecar::open(&self.path)?;
            for &name in names {
                let wfm = self.xl_waveform(&sidecar, name)?;
                result.insert(name.to_owned(), Signal::Waveform(wfm));
            }
        } else {
            for &name in names {
                result.insert(name.to_owned(), self.get_signal(name)?);
            }
        }
        Ok(result)
    }

    fn xl_waveform(&self, sidecar: &XlSidecar, name: &str) -> Result<Waveform, PsfError> {
        let traces = self.traces.as_ref().ok_or_else(|| unknown_name(name))?;
        let signal = traces.lookup(name).ok_or_else(|| unknown_name(name))?;
        let idx = signal
            .properties
            .get("psfxl_idx")
            .and_then(PropertyValue::as_xl_index)
            .ok_or_else(|| PsfError::MalformedSection {
                offset: 0,
                message: format!("signal {name:?} has no psfxl_idx property"),
            })?;
        let (x, y) = sidecar.read_signal(idx.chunk_offset as i64)?;
        Ok(Waveform::new(
            x,
            self.sweep_units(),
            Samples::Real(y),
            self.signal_units(signal),
            name.to_owned(),
        ))
    }

    fn swept_waveform(&self, name: &str) -> Result<Waveform, PsfError> {
        let traces = self.traces.as_ref().ok_or_else(|| unknown_name(name))?;
        let signal = traces.lookup(name).ok_or_else(|| unknown_name(name))?;
        let x_unit = self.sweep_units();
        let y_unit = self.signal_units(signal);

        match &self.swept {
            Some(swept) => {
                let y = swept
                    .traces
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, samples)| samples.clone())
                    .ok_or_else(|| unknown_name(name))?;
                Ok(Waveform::new(swept.x.clone(), x_unit, y, y_unit, name.to_owned()))
            }
            // Value section was the empty sentinel: the signal exists but
            // carries no samples.
            None => Ok(Waveform::new(
                Vec::new(),
                x_unit,
                Samples::Real(Vec::new()),
                y_unit,
                name.to_owned(),
            )),
        }
    }
}

fn unknown_name(name: &str) -> PsfError {
    PsfError::UnknownName(name.to_owned())
}

impl fmt::Display for PsfBinFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.is_psfxl_index {
            write!(f, "PsfBinFile:{file_name}: PSF-XL index file")?;
        } else {
            write!(f, "PsfBinFile:{file_name}: {} signals", self.names().len())?;
        }
        if self.is_sweep {
            write!(f, " (sweep: {} points)", self.npoints)?;
        }
        Ok(())
    }
}

impl SignalFile for PsfBinFile {
    fn header(&self) -> &Properties {
        self.header()
    }

    fn sweep_info(&self) -> Option<Properties> {
        self.sweep_info()
    }

    fn names(&self) -> Vec<String> {
        self.names()
    }

    fn signal_info(&self, name: &str) -> Result<Properties, PsfError> {
        self.signal_info(name)
    }

    fn get_signal(&self, name: &str) -> Result<Signal, PsfError> {
        self.get_signal(name)
    }

    fn get_signals(&self, names: &[&str]) -> Result<HashMap<String, Signal>, PsfError> {
        self.get_signals(names)
    }
}

/// A PSF result file behind the format dispatch.
///
/// [`PsfFile::load`] checks the leading bytes and hands ASCII results to
/// the external logFile decoder by reporting [`PsfError::AsciiFile`].
pub enum PsfFile {
    Binary(PsfBinFile),
    // Ascii: the logFile decoder is a separate text frontend.
}

impl PsfFile {
    /// Loads a PSF result file, selecting the decoder from the first bytes.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PsfError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        if detect_format(&bytes) == FileFormat::Ascii {
            return Err(PsfError::AsciiFile(path.to_path_buf()));
        }
        Ok(PsfFile::Binary(PsfBinFile::from_bytes(path, &bytes)?))
    }
}

impl SignalFile for PsfFile {
    fn header(&self) -> &Properties {
        match self {
            PsfFile::Binary(file) => file.header(),
        }
    }

    fn sweep_info(&self) -> Option<Properties> {
        match self {
            PsfFile::Binary(file) => file.sweep_info(),
        }
    }

    fn names(&self) -> Vec<String> {
        match self {
            PsfFile::Binary(file) => file.names(),
        }
    }

    fn signal_info(&self, name: &str) -> Result<Properties, PsfError> {
        match self {
            PsfFile::Binary(file) => file.signal_info(name),
        }
    }

    fn get_signal(&self, name: &str) -> Result<Signal, PsfError> {
        match self {
            PsfFile::Binary(file) => file.get_signal(name),
        }
    }

    fn get_signals(&self, names: &[&str]) -> Result<HashMap<String, Signal>, PsfError> {
        match self {
            PsfFile::Binary(file) => file.get_signals(names),
        }
    }
}
