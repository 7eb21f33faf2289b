//! 值编解码
//!
//! 每种标量类型的确定性、对称编码：
//! - 整数/浮点：4 字节小端，无长度前缀
//! - UID：16 字节原始数据，无长度前缀
//! - 字符串：4 字节**字符数**前缀 + 每字符 1/2/4 字节
//! - STREAM：4 字节字节数前缀 + 原始数据
//!
//! 编码前对文本做规范化（见 [`normalize_text`]），解码不做任何规范化。

use std::io::{Cursor, Read};

use encoding_rs::WINDOWS_1252;

use crate::datatypes::{read_f32, read_i32, write_f32, write_i32, VariableType, VariableValue};
use crate::utils::{normalize_text, Result, SaveError};

/// UID 固定长度
pub const UID_LENGTH: usize = 16;

/// 单平面之外或代码页无法表示的字符的替代字符
const REPLACEMENT: char = '?';

pub fn encode_int(value: i32) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

pub fn encode_float(value: f32) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

pub fn decode_int(bytes: &[u8]) -> Result<i32> {
    if bytes.len() < 4 {
        return Err(SaveError::CorruptRecord(format!(
            "integer needs 4 bytes, found {}",
            bytes.len()
        )));
    }
    let mut cursor = Cursor::new(bytes);
    Ok(read_i32(&mut cursor)?)
}

pub fn decode_float(bytes: &[u8]) -> Result<f32> {
    if bytes.len() < 4 {
        return Err(SaveError::CorruptRecord(format!(
            "float needs 4 bytes, found {}",
            bytes.len()
        )));
    }
    let mut cursor = Cursor::new(bytes);
    Ok(read_f32(&mut cursor)?)
}

/// 窄字符编码（Windows-1252 代码页）
fn encode_narrow_char(c: char) -> u8 {
    if c.is_ascii() {
        return c as u8;
    }
    let mut buf = [0u8; 4];
    let (bytes, _, had_errors) = WINDOWS_1252.encode(c.encode_utf8(&mut buf));
    if had_errors || bytes.len() != 1 {
        REPLACEMENT as u8
    } else {
        bytes[0]
    }
}

fn single_plane(c: char) -> u32 {
    let code = c as u32;
    if code > 0xFFFF {
        REPLACEMENT as u32
    } else {
        code
    }
}

/// 编码字符串的值字节（不含长度前缀）
///
/// 返回 (字符数, 字节)。字符数即长度前缀中写入的值。
pub fn encode_string(text: &str, string_type: VariableType) -> Result<(usize, Vec<u8>)> {
    let normalized = normalize_text(text);
    let units = normalized.chars().count();
    let mut data = Vec::with_capacity(units * string_type.unit_width());

    match string_type {
        VariableType::String => {
            data.extend(normalized.chars().map(encode_narrow_char));
        }
        VariableType::StringWide16 => {
            for c in normalized.chars() {
                data.extend_from_slice(&(single_plane(c) as u16).to_le_bytes());
            }
        }
        VariableType::StringWide32 => {
            for c in normalized.chars() {
                data.extend_from_slice(&single_plane(c).to_le_bytes());
            }
        }
        other => return Err(SaveError::type_mismatch(text, other, "string")),
    }

    Ok((units, data))
}

/// 解码字符串值字节（不含长度前缀）
pub fn decode_string(bytes: &[u8], string_type: VariableType) -> Result<String> {
    match string_type {
        VariableType::String => {
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
            Ok(text.into_owned())
        }
        VariableType::StringWide16 | VariableType::StringWide32 => {
            let width = string_type.unit_width();
            if bytes.len() % width != 0 {
                return Err(SaveError::CorruptRecord(format!(
                    "{} bytes is not a whole number of {}-byte characters",
                    bytes.len(),
                    width
                )));
            }
            bytes
                .chunks_exact(width)
                .map(|chunk| {
                    let code = if width == 2 {
                        u16::from_le_bytes([chunk[0], chunk[1]]) as u32
                    } else {
                        u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])
                    };
                    char::from_u32(code).ok_or_else(|| {
                        SaveError::CorruptRecord(format!("invalid character code 0x{:X}", code))
                    })
                })
                .collect()
        }
        other => Err(SaveError::type_mismatch("<string>", other, "string")),
    }
}

/// 编码值字段（变长类型包含长度前缀）
///
/// 值种类与声明类型不符时返回 TypeMismatch，不做隐式转换
pub fn encode_value(name: &str, value: &VariableValue, variable_type: VariableType) -> Result<Vec<u8>> {
    if !value.fits(variable_type) {
        return Err(SaveError::type_mismatch(name, variable_type, value.kind()));
    }

    let mut data = Vec::new();
    match value {
        VariableValue::Int(v) => write_i32(&mut data, *v)?,
        VariableValue::Float(v) => write_f32(&mut data, *v)?,
        VariableValue::Text(text) => {
            let (units, bytes) = encode_string(text, variable_type)?;
            write_i32(&mut data, units as i32)?;
            data.extend_from_slice(&bytes);
        }
        VariableValue::Bytes(bytes) => {
            if variable_type == VariableType::Uid {
                if bytes.len() != UID_LENGTH {
                    return Err(SaveError::CorruptRecord(format!(
                        "UID '{}' must be {} bytes, found {}",
                        name,
                        UID_LENGTH,
                        bytes.len()
                    )));
                }
            } else {
                write_i32(&mut data, bytes.len() as i32)?;
            }
            data.extend_from_slice(bytes);
        }
    }
    Ok(data)
}

/// 解码值字段（变长类型包含长度前缀）
pub fn decode_value(bytes: &[u8], variable_type: VariableType) -> Result<VariableValue> {
    let mut cursor = Cursor::new(bytes);
    let value = match variable_type {
        VariableType::Integer => VariableValue::Int(decode_int(bytes)?),
        VariableType::Float => VariableValue::Float(decode_float(bytes)?),
        VariableType::Uid => {
            let mut uid = vec![0u8; UID_LENGTH];
            cursor
                .read_exact(&mut uid)
                .map_err(|_| SaveError::CorruptRecord("truncated UID".to_string()))?;
            VariableValue::Bytes(uid)
        }
        VariableType::Stream | VariableType::String | VariableType::StringWide16 | VariableType::StringWide32 => {
            if bytes.len() < 4 {
                return Err(SaveError::CorruptRecord(
                    "missing value length prefix".to_string(),
                ));
            }
            let units = read_i32(&mut cursor)?;
            if units < 0 {
                return Err(SaveError::CorruptRecord(format!(
                    "negative value length {}",
                    units
                )));
            }
            let length = units as usize * variable_type.unit_width();
            let payload = bytes.get(4..4 + length).ok_or_else(|| {
                SaveError::CorruptRecord(format!(
                    "value declares {} bytes but only {} are present",
                    length,
                    bytes.len() - 4
                ))
            })?;
            if variable_type == VariableType::Stream {
                VariableValue::Bytes(payload.to_vec())
            } else {
                VariableValue::Text(decode_string(payload, variable_type)?)
            }
        }
    };
    Ok(value)
}

/// 编码完整的 TLV 记录：名称长度 + 名称 + 值字段
pub fn encode_record(name: &str, value: &VariableValue, variable_type: VariableType) -> Result<Vec<u8>> {
    let value_field = encode_value(name, value, variable_type)?;
    let mut record = Vec::with_capacity(4 + name.len() + value_field.len());
    write_i32(&mut record, name.len() as i32)?;
    record.extend_from_slice(name.as_bytes());
    record.extend_from_slice(&value_field);
    Ok(record)
}
