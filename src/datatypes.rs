use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Write};

// 基础数值读取函数
pub fn read_i32(cursor: &mut Cursor<&[u8]>) -> Result<i32, std::io::Error> {
    cursor.read_i32::<LittleEndian>()
}

pub fn read_f32(cursor: &mut Cursor<&[u8]>) -> Result<f32, std::io::Error> {
    cursor.read_f32::<LittleEndian>()
}

// 基础数值写入函数
pub fn write_i32(writer: &mut dyn Write, value: i32) -> Result<(), std::io::Error> {
    writer.write_i32::<LittleEndian>(value)
}

pub fn write_f32(writer: &mut dyn Write, value: f32) -> Result<(), std::io::Error> {
    writer.write_f32::<LittleEndian>(value)
}

/// 变量类型（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableType {
    /// 32位小端整数
    Integer,
    /// 32位小端浮点数
    Float,
    /// 窄字符串（每字符1字节）
    String,
    /// 宽字符串（每字符2字节，Windows 版本）
    StringWide16,
    /// 宽字符串（每字符4字节，移动版本）
    StringWide32,
    /// 16字节原始标识符
    Uid,
    /// 不透明字节流
    Stream,
}

impl VariableType {
    /// 每个逻辑单位占用的字节数
    ///
    /// 字符串按字符计数，其余类型的 valSize 本身就是字节数
    pub fn unit_width(self) -> usize {
        match self {
            VariableType::StringWide16 => 2,
            VariableType::StringWide32 => 4,
            _ => 1,
        }
    }

    /// 值前是否带有 4 字节长度前缀
    pub fn is_variable_length(self) -> bool {
        matches!(
            self,
            VariableType::String
                | VariableType::StringWide16
                | VariableType::StringWide32
                | VariableType::Stream
        )
    }

    /// 长度前缀字节数（定长类型为 0）
    pub fn value_prefix(self) -> usize {
        if self.is_variable_length() {
            4
        } else {
            0
        }
    }

    pub fn is_string(self) -> bool {
        matches!(
            self,
            VariableType::String | VariableType::StringWide16 | VariableType::StringWide32
        )
    }

    pub fn is_wide_string(self) -> bool {
        matches!(self, VariableType::StringWide16 | VariableType::StringWide32)
    }
}

impl std::fmt::Display for VariableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            VariableType::Integer => "INTEGER",
            VariableType::Float => "FLOAT",
            VariableType::String => "STRING",
            VariableType::StringWide16 => "STRING_WIDE16",
            VariableType::StringWide32 => "STRING_WIDE32",
            VariableType::Uid => "UID",
            VariableType::Stream => "STREAM",
        };
        f.write_str(name)
    }
}

/// 存档的平台编码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    Windows,
    Mobile,
}

impl Platform {
    /// 该平台上宽字符串使用的编码类型
    pub fn wide_string_type(self) -> VariableType {
        match self {
            Platform::Windows => VariableType::StringWide16,
            Platform::Mobile => VariableType::StringWide32,
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Platform::Windows
    }
}

/// 解码后的变量值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VariableValue {
    Int(i32),
    Float(f32),
    Text(String),
    /// UID 与 STREAM 共用
    Bytes(Vec<u8>),
}

impl VariableValue {
    /// 值种类是否可以存放在指定类型的变量中
    pub fn fits(&self, variable_type: VariableType) -> bool {
        match self {
            VariableValue::Int(_) => variable_type == VariableType::Integer,
            VariableValue::Float(_) => variable_type == VariableType::Float,
            VariableValue::Text(_) => variable_type.is_string(),
            VariableValue::Bytes(_) => {
                matches!(variable_type, VariableType::Uid | VariableType::Stream)
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            VariableValue::Int(_) => "integer",
            VariableValue::Float(_) => "float",
            VariableValue::Text(_) => "string",
            VariableValue::Bytes(_) => "bytes",
        }
    }
}
