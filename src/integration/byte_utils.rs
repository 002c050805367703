use std::io::{self, Read};

pub fn read_u8(source: &mut &[u8]) -> io::Result<u8> {
    let mut buffer = [0];
    source.read_exact(&mut buffer)?;
    Ok(buffer[0])
}

pub fn read_u32(source: &mut &[u8]) -> io::Result<u32> {
    let mut buffer = [0; 4];
    source.read_exact(&mut buffer)?;
    Ok(u32::from_be_bytes(buffer))
}

pub fn read_f32(source: &mut &[u8]) -> io::Result<f32> {
    let mut buffer = [0; 4];
    source.read_exact(&mut buffer)?;
    Ok(f32::from_be_bytes(buffer))
}

pub fn read_f32_vec(source: &mut &[u8], length: usize) -> io::Result<Vec<f32>> {
    let mut buffer = vec![0; length * 4];
    source.read_exact(&mut buffer)?;

    Ok(buffer
        .chunks_exact(4)
        .map(|arr| f32::from_be_bytes([arr[0], arr[1], arr[2], arr[3]]))
        .collect())
}

pub fn write_u32(result: &mut Vec<u8>, num: u32) {
    result.extend(num.to_be_bytes())
}

pub fn write_f32(result: &mut Vec<u8>, num: f32) {
    result.extend(num.to_be_bytes())
}

pub fn write_f32_iter<'a>(result: &mut Vec<u8>, nums: impl Iterator<Item = &'a f32>) {
    nums.flat_map(|o| o.to_be_bytes())
        .for_each(|o| result.push(o))
}
