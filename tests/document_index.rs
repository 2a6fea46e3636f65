use rstest::rstest;
use temp_dir::TempDir;

use spimi_index::{
    base::Len,
    document_index::{
        read_document_length, read_document_lengths, DocumentIndex, DocumentIndexWriter,
        DOCUMENT_RECORD_LENGTH,
    },
};

fn write_documents(path: &std::path::Path, count: u64) {
    let mut writer = DocumentIndexWriter::create(path).unwrap();
    for docid in 0..count {
        writer
            .append(docid, &format!("doc-{}", docid), (docid * 7 % 13) as u32 + 1)
            .unwrap();
    }
    assert_eq!(writer.count(), count);
    writer.finish().unwrap();
}

#[rstest]
#[case(1)]
#[case(10)]
#[case(257)]
fn test_round_trip(#[case] count: u64) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("documents.dat");
    write_documents(&path, count);

    assert_eq!(
        std::fs::metadata(&path).unwrap().len(),
        count * DOCUMENT_RECORD_LENGTH as u64
    );

    let index = DocumentIndex::load(&path).unwrap();
    assert_eq!(index.len(), count as usize);
    let lengths = read_document_lengths(&path).unwrap();
    for docid in 0..count {
        let expected = (docid * 7 % 13) as u32 + 1;
        assert_eq!(index.name(docid), Some(format!("doc-{}", docid).as_str()));
        assert_eq!(index.length(docid), Some(expected));
        assert_eq!(lengths[docid as usize], expected);
        assert_eq!(read_document_length(&path, docid).unwrap(), expected);
    }
}

#[test]
fn test_random_access_out_of_range() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("documents.dat");
    write_documents(&path, 3);
    assert!(read_document_length(&path, 3).is_err());
}

#[test]
fn test_long_names_are_truncated() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("documents.dat");
    let name = "n".repeat(60);

    let mut writer = DocumentIndexWriter::create(&path).unwrap();
    writer.append(0, &name, 5).unwrap();
    writer.finish().unwrap();

    let index = DocumentIndex::load(&path).unwrap();
    assert_eq!(index.name(0), Some(&name[..48]));
}

#[test]
fn test_truncated_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("documents.dat");
    write_documents(&path, 2);
    let data = std::fs::read(&path).unwrap();
    std::fs::write(&path, &data[..data.len() - 10]).unwrap();
    assert!(DocumentIndex::load(&path).is_err());
}
