use ropdf::{Document, Error, Object, XrefError};

/// A 1.5-style document: five objects packed into an object stream,
/// indexed by an uncompressed cross-reference stream.
///
/// Object 10 sits in slot 3 of container 20, mirroring how writers pack
/// page dictionaries away from the byte level.
fn compressed_pdf() -> Vec<u8> {
    // container payload: the pair table, then the bodies
    let ids = [11_u32, 12, 13, 10, 14];
    let bodies = [
        "<< /Type /Catalog /Pages 12 0 R >>",
        "<< /Type /Pages /Kids [10 0 R] /Count 1 >>",
        "(spare)",
        "<< /Type /Page /Parent 12 0 R >>",
        "42",
    ];

    let mut pairs = String::new();
    let mut packed = String::new();
    for (id, body) in ids.iter().zip(bodies) {
        pairs.push_str(&format!("{id} {} ", packed.len()));
        packed.push_str(body);
        packed.push(' ');
    }
    let first = pairs.len();
    let mut payload = pairs.into_bytes();
    payload.extend_from_slice(packed.as_bytes());

    let mut pdf = b"%PDF-1.5\n".to_vec();
    let container_offset = pdf.len();
    pdf.extend_from_slice(
        format!(
            "20 0 obj\n<< /Type /ObjStm /N {} /First {} /Length {} >>\nstream\n",
            ids.len(),
            first,
            payload.len()
        )
        .as_bytes(),
    );
    pdf.extend_from_slice(&payload);
    pdf.extend_from_slice(b"\nendstream\nendobj\n");

    // cross-reference stream: W [1 2 1], one record per object
    let xref_offset = pdf.len();
    let mut records: Vec<u8> = Vec::new();
    let mut record = |kind: u8, f1: u16, f2: u8| {
        records.push(kind);
        records.extend_from_slice(&f1.to_be_bytes());
        records.push(f2);
    };
    record(2, 20, 3); // 10: slot 3 of container 20
    record(2, 20, 0); // 11
    record(2, 20, 1); // 12
    record(2, 20, 2); // 13
    record(2, 20, 4); // 14
    record(1, container_offset as u16, 0); // 20
    record(1, xref_offset as u16, 0); // 30: this stream
    record(2, 99, 0); // 40: container that is not in use

    let dict = format!(
        "<< /Type /XRef /Size 41 /Root 11 0 R /W [1 2 1] /Index [10 5 20 1 30 1 40 1] /Length {} >>",
        records.len()
    );
    pdf.extend_from_slice(format!("30 0 obj\n{dict}\nstream\n").as_bytes());
    pdf.extend_from_slice(&records);
    pdf.extend_from_slice(b"\nendstream\nendobj\n");

    pdf.extend_from_slice(b"startxref\n");
    pdf.extend_from_slice(xref_offset.to_string().as_bytes());
    pdf.extend_from_slice(b"\n%%EOF\n");
    pdf
}

#[test]
fn compressed_object_resolves_to_its_slot() {
    let mut doc = Document::load_mem(compressed_pdf()).unwrap();
    let page = doc.get_object((10, 0)).unwrap().as_dict().unwrap();
    assert!(page.has_type(b"Page"));
}

#[test]
fn every_packed_object_is_reachable() {
    let mut doc = Document::load_mem(compressed_pdf()).unwrap();
    assert_eq!(doc.get_object((13, 0)).unwrap().as_str().unwrap(), b"spare");
    assert_eq!(doc.get_object((14, 0)).unwrap().as_i64().unwrap(), 42);
    assert_eq!(doc.page_count().unwrap(), 1);
}

#[test]
fn catalog_comes_out_of_the_container() {
    let mut doc = Document::load_mem(compressed_pdf()).unwrap();
    let catalog = doc.catalog().unwrap();
    assert_eq!(
        catalog.get(b"Pages").unwrap().as_reference().unwrap(),
        (12, 0)
    );
}

#[test]
fn missing_container_is_object_not_found() {
    let mut doc = Document::load_mem(compressed_pdf()).unwrap();
    assert!(matches!(
        doc.get_object((40, 0)),
        Err(Error::ObjectNotFound(_))
    ));
}

#[test]
fn slot_out_of_range_is_an_xref_error() {
    // rewrite object 10's record to point past /N
    let mut pdf = compressed_pdf();
    let records_at = pdf
        .windows(4)
        .rposition(|w| w == [2, 0, 20, 3])
        .expect("record for object 10");
    pdf[records_at + 3] = 7;

    let mut doc = Document::load_mem(pdf).unwrap();
    assert!(matches!(
        doc.get_object((10, 0)),
        Err(Error::Xref(XrefError::ObjectStream))
    ));
}

#[test]
fn nonzero_generation_never_matches_a_compressed_entry() {
    let mut doc = Document::load_mem(compressed_pdf()).unwrap();
    assert!(matches!(
        doc.get_object((10, 1)),
        Err(Error::ObjectNotFound((10, 1)))
    ));
}

#[test]
fn xref_stream_trailer_keys_are_fused() {
    let doc = Document::load_mem(compressed_pdf()).unwrap();
    assert!(doc.trailer().has(b"W"));
    assert_eq!(doc.trailer().get(b"Size").unwrap().as_i64().unwrap(), 41);
    assert_eq!(
        doc.trailer().get(b"Root").unwrap(),
        &Object::Reference((11, 0))
    );
}
