use std::fmt::Write;

use expect_test::{expect, Expect};

use super::JpegParser;

fn dump(jpeg: &[u8]) -> String {
    fn dump_impl(jpeg: &[u8], out: &mut String) -> crate::error::Result<()> {
        let mut parser = JpegParser::new(jpeg)?;
        while let Some(segment) = parser.next_segment()? {
            writeln!(out, "[FF {:02X}] {:?}", segment.marker(), segment.kind()).unwrap();
        }
        Ok(())
    }

    let mut out = String::new();
    if let Err(e) = dump_impl(jpeg, &mut out) {
        writeln!(out, "error: {e}").unwrap();
    }

    out
}

fn check(jpeg: &[u8], expect: Expect) {
    expect.assert_eq(&dump(jpeg));
}

#[test]
fn empty() {
    check(
        &[0xFF],
        expect![[r#"
            error: reached end of data while decoding JPEG stream
        "#]],
    );
    check(
        &[0xFF, 0xD8 /* SOI */],
        expect![[r#"
            error: reached end of data while decoding JPEG stream
        "#]],
    );
    check(
        &[
            0xFF, 0xD8, // SOI
            0xFF, 0xD9, // EOI
        ],
        expect![[""]],
    );
}

#[test]
fn app() {
    check(
        &[
            0xFF, 0xD8, // SOI
            0xFF, 0xE0, // APP0
            0x00, 0x02, // empty
            0xFF, 0xD9, // EOI
        ],
        expect![[r#"
            [FF E0] App(App { n: 0 })
        "#]],
    );
    check(
        &[
            0xFF, 0xD8, // SOI
            0xFF, 0xEF, // APP15
            0x00, 0x04, // 2 more bytes after this
            0xAB, 0xCD, // arbitrary payload, skipped
            0xFF, 0xD9, // EOI
        ],
        expect![[r#"
            [FF EF] App(App { n: 15 })
        "#]],
    );
}

#[test]
fn com() {
    let jpeg = [
        0xFF, 0xD8, // SOI
        0xFF, 0xFE, // COM
        0x00, 0x07, // length
        b'h', b'e', b'l', b'l', b'o', // text
        0xFF, 0xD9, // EOI
    ];
    check(
        &jpeg,
        expect![[r#"
            [FF FE] Com(Com("hello"))
        "#]],
    );

    let mut parser = JpegParser::new(&jpeg[..]).unwrap();
    let segment = parser.next_segment().unwrap().unwrap();
    match segment.into_kind() {
        super::SegmentKind::Com(com) => assert_eq!(com.text(), "hello"),
        other => panic!("unexpected segment {other:?}"),
    }
}

#[test]
fn frame_and_scan_headers() {
    check(
        &[
            0xFF, 0xD8, // SOI
            0xFF, 0xC0, // SOF0
            0x00, 0x0B, // length
            0x08, // P
            0x00, 0x08, // Y
            0x00, 0x08, // X
            0x01, // Nf
            0x01, 0x11, 0x00, // component 1, 1x1 sampling, qtable 0
            0xFF, 0xDA, // SOS
            0x00, 0x08, // length
            0x01, // Ns
            0x01, 0x00, // component 1, DC 0, AC 0
            0x00, 0x3F, 0x00, // Ss, Se, AhAl
            0xFF, 0xD9, // EOI
        ],
        expect![[r#"
            [FF C0] Sof(Sof { sof: SOF0, P: 8, Y: 8, X: 8, components: [FrameComponent { Ci: 1, Hi: 1, Vi: 1, Tqi: 0 }] })
            [FF DA] Sos(Sos { components: [ScanComponent { Csj: 1, Tdj: 0, Taj: 0 }], Ss: 0, Se: 63, Ah: 0, Al: 0 })
        "#]],
    );

    // Non-baseline SOF variants parse fine at the wire level; rejecting them
    // is the decoder's job, which can then name the actual variant.
    check(
        &[
            0xFF, 0xD8, // SOI
            0xFF, 0xC2, // SOF2 (progressive)
            0x00, 0x0B, // length
            0x08, 0x00, 0x08, 0x00, 0x08, 0x01, 0x01, 0x11, 0x00,
            0xFF, 0xD9, // EOI
        ],
        expect![[r#"
            [FF C2] Sof(Sof { sof: SOF2, P: 8, Y: 8, X: 8, components: [FrameComponent { Ci: 1, Hi: 1, Vi: 1, Tqi: 0 }] })
        "#]],
    );
}

#[test]
fn dht() {
    check(
        &[
            0xFF, 0xD8, // SOI
            0xFF, 0xC4, // DHT
            0x00, 0x14, // length
            0x00, // Tc 0, Th 0
            0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // Li
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // Li
            0x05, // Vij
            0xFF, 0xD9, // EOI
        ],
        expect![[r#"
            [FF C4] Dht([HuffmanTable { Tc: 0, Th: 0, Li: [0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0], Vij: [5] }])
        "#]],
    );
}

#[test]
fn dqt() {
    // One 8-bit and one 16-bit precision table in a single segment.
    let mut jpeg = vec![
        0xFF, 0xD8, // SOI
        0xFF, 0xDB, // DQT
        0x00, 0xC4, // length: 2 + 65 + 129
    ];
    jpeg.push(0x03); // Pq 0, Tq 3
    jpeg.extend((0u8..64).map(|i| i + 1));
    jpeg.push(0x14); // Pq 1, Tq 4
    jpeg.extend((0u16..64).flat_map(|i| (0x100 + i).to_be_bytes()));
    jpeg.extend([0xFF, 0xD9]); // EOI

    let mut parser = JpegParser::new(&jpeg[..]).unwrap();
    let segment = parser.next_segment().unwrap().unwrap();
    let super::SegmentKind::Dqt(tables) = segment.kind() else {
        panic!("expected DQT segment");
    };
    assert_eq!(tables.len(), 2);
    assert_eq!(tables[0].Pq(), 0);
    assert_eq!(tables[0].Tq(), 3);
    assert_eq!(tables[0].Qk()[0], 1);
    assert_eq!(tables[0].Qk()[63], 64);
    assert_eq!(tables[1].Pq(), 1);
    assert_eq!(tables[1].Tq(), 4);
    assert_eq!(tables[1].Qk()[0], 0x100);
    assert_eq!(tables[1].Qk()[63], 0x13F);
    assert!(parser.next_segment().unwrap().is_none());

    check(
        &[
            0xFF, 0xD8, // SOI
            0xFF, 0xDB, // DQT
            0x00, 0x03, // length
            0x20, // Pq 2: invalid
            0xFF, 0xD9,
        ],
        expect![[r#"
            error: invalid quantization table precision Pq=2 (only 0 and 1 are valid)
        "#]],
    );
}

#[test]
fn rejected_markers() {
    check(
        &[0x00, 0xD8],
        expect![[r#"
            error: JPEG image does not start with SOI marker
        "#]],
    );
    check(
        &[
            0xFF, 0xD8, // SOI
            0xFF, 0xDD, // DRI
            0x00, 0x04, 0x00, 0x0F,
        ],
        expect![[r#"
            error: DRI segment: restart intervals are not supported
        "#]],
    );
    check(
        &[
            0xFF, 0xD8, // SOI
            0xFF, 0xD0, // RST0
        ],
        expect![[r#"
            error: standalone marker ff d0 is not allowed in a baseline stream
        "#]],
    );
    check(
        &[
            0xFF, 0xD8, // SOI
            0xFF, 0xD8, // SOI again
        ],
        expect![[r#"
            error: second SOI marker inside the image
        "#]],
    );
    check(
        &[
            0xFF, 0xD8, // SOI
            0xFF, 0xC8, // JPG (reserved)
            0x00, 0x02,
        ],
        expect![[r#"
            error: unknown marker ff c8
        "#]],
    );
    check(
        &[
            0xFF, 0xD8, // SOI
            0x42, // not a marker
        ],
        expect![[r#"
            error: expected a marker, found stray byte 42
        "#]],
    );
}

#[test]
fn segment_length_checks() {
    check(
        &[
            0xFF, 0xD8, // SOI
            0xFF, 0xFE, // COM
            0x00, 0x01, // length below the 2-byte minimum
        ],
        expect![[r#"
            error: invalid segment length 1
        "#]],
    );

    // SOF0 whose payload is one byte longer than 6 + 3N.
    check(
        &[
            0xFF, 0xD8, // SOI
            0xFF, 0xC0, // SOF0
            0x00, 0x0C, // length
            0x08, 0x00, 0x08, 0x00, 0x08, 0x01, 0x01, 0x11, 0x00, // frame header
            0xAA, // excess byte
            0xFF, 0xD9,
        ],
        expect![[r#"
            error: ff c0 segment specified a length of 10 bytes, but 1 remain after decoding
        "#]],
    );
}

#[test]
fn fill_bytes_before_marker() {
    check(
        &[
            0xFF, 0xD8, // SOI
            0xFF, 0xFF, 0xFF, 0xE0, // APP0 behind fill bytes
            0x00, 0x02, // empty
            0xFF, 0xD9, // EOI
        ],
        expect![[r#"
            [FF E0] App(App { n: 0 })
        "#]],
    );
}
