use rstest::rstest;

use spimi_index::{
    compress::{vbyte, Compression},
    error::Error,
};

#[rstest]
#[case(0, vec![0x80])]
#[case(1, vec![0x81])]
#[case(127, vec![0xFF])]
#[case(128, vec![0x01, 0x80])]
#[case(16383, vec![0x7F, 0xFF])]
#[case(16384, vec![0x01, 0x00, 0x80])]
fn test_encoding(#[case] value: u64, #[case] expected: Vec<u8>) {
    assert_eq!(vbyte::encode(value), expected);
    assert_eq!(vbyte::decode(&expected).unwrap(), vec![value]);
}

#[test]
fn test_concatenated_sequence() {
    let values: Vec<u64> = vec![0, 5, 127, 128, 300, 1 << 35, u64::MAX, 2];
    let mut data = Vec::new();
    for &v in values.iter() {
        vbyte::encode_into(v, &mut data);
    }
    assert_eq!(vbyte::decode(&data).unwrap(), values);
}

#[test]
fn test_truncated_stream() {
    let mut data = vbyte::encode(42);
    data.extend(vbyte::encode(1 << 20));
    data.pop();
    assert!(matches!(vbyte::decode(&data), Err(Error::Corrupted(_))));
}

#[test]
fn test_domain_overflow() {
    let data = vbyte::encode(u32::MAX as u64 + 1);
    assert!(matches!(
        vbyte::decode_as::<u32>(&data),
        Err(Error::Corrupted(_))
    ));

    // 11 groups do not fit in 64 bits
    let data = [0x7F; 10]
        .iter()
        .copied()
        .chain(std::iter::once(0xFF))
        .collect::<Vec<u8>>();
    assert!(vbyte::decode(&data).is_err());
}

#[rstest]
fn test_streams(
    #[values(Compression::VariableByte, Compression::Identity)] compression: Compression,
) {
    let docids: Vec<u64> = vec![0, 3, 1000, 1 << 40];
    let frequencies: Vec<u32> = vec![1, 2, 300, u32::MAX];

    let mut data = Vec::new();
    let written = compression.write(&mut data, &docids).unwrap();
    assert_eq!(written, data.len());
    if compression == Compression::Identity {
        assert_eq!(written, 8 * docids.len());
    }
    assert_eq!(compression.read::<u64>(&data).unwrap(), docids);

    let mut data = Vec::new();
    compression.write(&mut data, &frequencies).unwrap();
    assert_eq!(compression.read::<u32>(&data).unwrap(), frequencies);
}

#[test]
fn test_raw_is_big_endian() {
    let mut data = Vec::new();
    Compression::Identity.write(&mut data, &[1u32]).unwrap();
    assert_eq!(data, vec![0, 0, 0, 1]);
    assert!(Compression::Identity.read::<u32>(&data[..3]).is_err());
}
