use byteorder::{BigEndian, ByteOrder};

/// Two octet checksum: sum of all octets mod 65536.
#[inline]
pub fn calculate_simple(data: &[u8]) -> u16 {
    let sum = data.iter().map(|v| u32::from(*v)).sum::<u32>() & 0xffff;
    sum as u16
}

/// Appends the big endian simple checksum of `data` to `out`.
pub fn append_simple(data: &[u8], out: &mut Vec<u8>) {
    let mut buf = [0u8; 2];
    BigEndian::write_u16(&mut buf, calculate_simple(data));
    out.extend_from_slice(&buf);
}
