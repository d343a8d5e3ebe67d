mod common;

use std::path::PathBuf;

use common::*;
use psf_rs::{PsfBinFile, PsfError, Signal};

/// A Blosc1 chunk in its "memcpyed" form: the 16-byte header followed by
/// the payload verbatim. The real sidecars compress with blosclz, but both
/// forms decode through the same path.
fn blosc_run(values: &[f64]) -> Vec<u8> {
    let payload: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    let mut run = vec![0x02, 0x01, 0x02, 0x08];
    run.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    run.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    run.extend_from_slice(&((payload.len() + 16) as u32).to_le_bytes());
    run.extend_from_slice(&payload);
    run
}

fn previous_field(previous: i64) -> String {
    if previous < 0 {
        String::from("ffffffffffffffff")
    } else {
        format!("{previous:x}")
    }
}

/// Appends one type-0x22 chunk (x and y runs back to back after the
/// marker) and returns its marker offset.
fn append_chunk(sidecar: &mut Vec<u8>, previous: i64, x: &[f64], y: &[f64]) -> usize {
    let offset = sidecar.len();
    let x_run = blosc_run(x);
    let y_run = blosc_run(y);
    let marker = format!(
        "3:0:{}:{:x}:{:x}:22:{:x}:{:x}",
        previous_field(previous),
        x.len(),
        x_run.len() + y_run.len(),
        x_run.len(),
        y_run.len()
    );
    sidecar.push(0x03);
    sidecar.extend_from_slice(marker.as_bytes());
    sidecar.push(0);
    while sidecar.len() % 8 != 0 {
        sidecar.push(0);
    }
    sidecar.extend_from_slice(&x_run);
    sidecar.extend_from_slice(&y_run);
    offset
}

/// Appends one type-0xa0 chunk: the x run behind the marker, the y value a
/// literal double after it. Returns the marker offset.
fn append_literal_chunk(sidecar: &mut Vec<u8>, previous: i64, x: &[f64], y: f64) -> usize {
    let x_start = sidecar.len();
    let x_run = blosc_run(x);
    sidecar.extend_from_slice(&x_run);
    let offset = sidecar.len();
    let marker = format!(
        "3:0:{}:{:x}:8:a0:{:x}.{:x}",
        previous_field(previous),
        x.len(),
        offset - x_start,
        x_run.len()
    );
    sidecar.push(0x03);
    sidecar.extend_from_slice(marker.as_bytes());
    sidecar.push(0);
    while sidecar.len() % 8 != 0 {
        sidecar.push(0);
    }
    sidecar.extend_from_slice(&y.to_le_bytes());
    offset
}

/// Builds a PSF-XL index file whose traces carry the given chunk offsets.
fn index_image(points: u32, traces: &[(&str, i32, i32)]) -> Vec<u8> {
    let mut image = ImageBuilder::new(0x200);
    image.section(0, |_| header_body(1, points, None));
    image.section(1, |start| {
        type_body(
            start,
            &[
                (1, typedef(1, "time", DOUBLE, Some("s"))),
                (2, typedef(2, "voltage", DOUBLE, Some("V"))),
            ],
        )
    });
    image.section(2, |_| signaldef(10, "time", 1, &[]));
    let elems: Vec<Vec<u8>> = traces
        .iter()
        .enumerate()
        .map(|(i, &(name, chunk_offset, point_count))| {
            let mut props = Vec::new();
            push_prop_xl_index(&mut props, i as i64, chunk_offset, point_count);
            signaldef(20 + i as u32, name, 2, &props)
        })
        .collect();
    image.section(3, |start| trace_body(start, &elems));
    image.finish_index()
}

fn write_pair(index: &[u8], sidecar: Option<&[u8]>) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tran.tran.tran");
    std::fs::write(&path, index).unwrap();
    if let Some(sidecar) = sidecar {
        std::fs::write(dir.path().join("tran.tran.tran.psfxl"), sidecar).unwrap();
    }
    (dir, path)
}

#[test]
fn index_files_are_detected_and_list_names() {
    let index = index_image(5, &[("vout", 0, 5)]);
    let (_dir, path) = write_pair(&index, None);
    let file = PsfBinFile::open(&path).unwrap();
    assert!(file.is_psfxl_index());
    assert!(file.is_sweep());
    assert_eq!(file.names(), ["vout"]);
    assert!(file.to_string().contains("PSF-XL index file"));

    let info = file.signal_info("vout").unwrap();
    let idx = info.get("psfxl_idx").and_then(psf_rs::PropertyValue::as_xl_index).unwrap();
    assert_eq!(idx.point_count, 5);
}

#[test]
fn two_chunk_signal_concatenates_in_time_order() {
    let mut sidecar = vec![0u8; 8]; // keep chunk offsets away from zero
    let first = append_chunk(&mut sidecar, -1, &[0.0, 1e-9, 2e-9], &[0.0, 0.1, 0.2]);
    let last = append_chunk(&mut sidecar, first as i64, &[3e-9, 4e-9], &[0.3, 0.4]);

    let index = index_image(5, &[("vout", last as i32, 5)]);
    let (_dir, path) = write_pair(&index, Some(&sidecar));
    let file = PsfBinFile::open(&path).unwrap();

    let signal = file.get_signal("vout").unwrap();
    let wfm = match signal {
        Signal::Waveform(wfm) => wfm,
        Signal::Value(_) => panic!("expected a waveform"),
    };
    assert_eq!(wfm.x, [0.0, 1e-9, 2e-9, 3e-9, 4e-9]);
    assert_eq!(wfm.y.as_real().unwrap(), [0.0, 0.1, 0.2, 0.3, 0.4]);
    assert!(wfm.x.windows(2).all(|w| w[0] < w[1]));
    // the chunk chain accounts for every sample the index declares
    assert_eq!(wfm.x.len(), 5);
    assert_eq!(wfm.x_unit, "s");
    assert_eq!(wfm.y_unit, "V");
}

#[test]
fn literal_chunks_broadcast_their_value() {
    let mut sidecar = vec![0u8; 8];
    let offset = append_literal_chunk(&mut sidecar, -1, &[0.0, 1e-9, 2e-9], 0.75);

    let index = index_image(3, &[("vdd", offset as i32, 3)]);
    let (_dir, path) = write_pair(&index, Some(&sidecar));
    let file = PsfBinFile::open(&path).unwrap();

    let signal = file.get_signal("vdd").unwrap();
    let wfm = signal.as_waveform().unwrap().clone();
    assert_eq!(wfm.x.len(), 3);
    assert_eq!(wfm.y.as_real().unwrap(), [0.75, 0.75, 0.75]);
}

#[test]
fn batch_fetch_opens_the_sidecar_once() {
    let mut sidecar = vec![0u8; 8];
    let a = append_chunk(&mut sidecar, -1, &[0.0, 1e-9], &[0.1, 0.2]);
    let b = append_chunk(&mut sidecar, -1, &[0.0, 1e-9], &[0.3, 0.4]);

    let index = index_image(2, &[("vout", a as i32, 2), ("vin", b as i32, 2)]);
    let (_dir, path) = write_pair(&index, Some(&sidecar));
    let file = PsfBinFile::open(&path).unwrap();

    let signals = file.get_signals(&["vout", "vin"]).unwrap();
    assert_eq!(signals.len(), 2);
    let vin = signals["vin"].as_waveform().unwrap();
    assert_eq!(vin.y.as_real().unwrap(), [0.3, 0.4]);
    assert_eq!(vin.name, "vin");
}

#[test]
fn missing_sidecar_is_reported() {
    let index = index_image(2, &[("vout", 8, 2)]);
    let (_dir, path) = write_pair(&index, None);
    let file = PsfBinFile::open(&path).unwrap();
    assert!(matches!(file.get_signal("vout"), Err(PsfError::SidecarMissing(_))));
}

#[test]
fn garbage_markers_are_rejected() {
    let mut sidecar = vec![0u8; 8];
    sidecar.push(0x03);
    sidecar.extend_from_slice(b"not a marker\0");
    let index = index_image(1, &[("vout", 8, 1)]);
    let (_dir, path) = write_pair(&index, Some(&sidecar));
    let file = PsfBinFile::open(&path).unwrap();
    assert!(matches!(file.get_signal("vout"), Err(PsfError::BadMarker { .. })));
}

#[test]
fn chunk_type_0x20_is_unsupported() {
    let mut sidecar = vec![0u8; 8];
    let offset = sidecar.len();
    sidecar.push(0x03);
    sidecar.extend_from_slice(b"3:0:ffffffffffffffff:1:8:20:8\0");
    while sidecar.len() % 8 != 0 {
        sidecar.push(0);
    }
    sidecar.extend_from_slice(&0.5f64.to_le_bytes());

    let index = index_image(1, &[("vout", offset as i32, 1)]);
    let (_dir, path) = write_pair(&index, Some(&sidecar));
    let file = PsfBinFile::open(&path).unwrap();
    assert!(matches!(
        file.get_signal("vout"),
        Err(PsfError::UnsupportedChunkType { chunk_type: 0x20, .. })
    ));
}

#[test]
fn corrupt_blosc_runs_are_reported() {
    let mut sidecar = vec![0u8; 8];
    let offset = sidecar.len();
    // a plausible marker pointing at bytes that are not a Blosc chunk
    sidecar.push(0x03);
    sidecar.extend_from_slice(b"3:0:ffffffffffffffff:2:20:22:10:10\0");
    while sidecar.len() % 8 != 0 {
        sidecar.push(0);
    }
    sidecar.extend_from_slice(&[0x55u8; 0x20]);

    let index = index_image(2, &[("vout", offset as i32, 2)]);
    let (_dir, path) = write_pair(&index, Some(&sidecar));
    let file = PsfBinFile::open(&path).unwrap();
    assert!(matches!(
        file.get_signal("vout"),
        Err(PsfError::BloscDecompress { .. })
    ));
}
