use serde::{Deserialize, Serialize};

use crate::codec::UID_LENGTH;
use crate::datatypes::{VariableType, VariableValue};
use crate::utils::{Result, SaveError};

/// 变量描述符
///
/// 描述存档中一个具体的变量出现位置。构造后不可变，
/// 所有编辑都以其偏移量为键记录在覆盖层中。
///
/// 磁盘布局：
/// ```text
/// keyOffset -> nameLen:i32 | name | [valueLen:i32] | value
///                                   ^ 仅变长类型     ^ valOffset
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableInfo {
    name: String,
    alias: Option<String>,
    key_offset: usize,
    val_offset: usize,
    /// 字符串为字符数，其余类型为字节数
    val_size: usize,
    variable_type: VariableType,
    value: VariableValue,
    block_offset: usize,
}

/// 构造 [`VariableInfo`] 的选项
///
/// `val_offset` 与 `val_size` 缺省时根据类型推导
#[derive(Debug, Clone)]
pub struct VariableOptions {
    pub name: String,
    pub alias: Option<String>,
    pub block_offset: usize,
    pub key_offset: usize,
    pub val_offset: Option<usize>,
    pub val_size: Option<usize>,
    pub variable_type: VariableType,
    pub value: VariableValue,
}

impl VariableOptions {
    /// 创建选项，偏移量默认为 0
    pub fn new(name: impl Into<String>, variable_type: VariableType, value: VariableValue) -> Self {
        Self {
            name: name.into(),
            alias: None,
            block_offset: 0,
            key_offset: 0,
            val_offset: None,
            val_size: None,
            variable_type,
            value,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn block_offset(mut self, block_offset: usize) -> Self {
        self.block_offset = block_offset;
        self
    }

    pub fn key_offset(mut self, key_offset: usize) -> Self {
        self.key_offset = key_offset;
        self
    }

    pub fn val_offset(mut self, val_offset: usize) -> Self {
        self.val_offset = Some(val_offset);
        self
    }

    pub fn val_size(mut self, val_size: usize) -> Self {
        self.val_size = Some(val_size);
        self
    }

    pub fn build(self) -> Result<VariableInfo> {
        VariableInfo::new(self)
    }
}

impl VariableInfo {
    /// 根据选项构造描述符
    ///
    /// # 错误
    /// - 值种类与声明类型不符时返回 `TypeMismatch`
    /// - UID 不是 16 字节时返回 `CorruptRecord`
    pub fn new(options: VariableOptions) -> Result<Self> {
        let VariableOptions {
            name,
            alias,
            block_offset,
            key_offset,
            val_offset,
            val_size,
            variable_type,
            value,
        } = options;

        if !value.fits(variable_type) {
            return Err(SaveError::type_mismatch(&name, variable_type, value.kind()));
        }
        if let (VariableType::Uid, VariableValue::Bytes(bytes)) = (variable_type, &value) {
            if bytes.len() != UID_LENGTH {
                return Err(SaveError::CorruptRecord(format!(
                    "UID '{}' must be {} bytes, found {}",
                    name,
                    UID_LENGTH,
                    bytes.len()
                )));
            }
        }

        let val_size = val_size.unwrap_or_else(|| Self::derive_size(&value));
        let val_offset = val_offset
            .unwrap_or(key_offset + 4 + name.len() + variable_type.value_prefix());

        Ok(Self {
            name,
            alias,
            key_offset,
            val_offset,
            val_size,
            variable_type,
            value,
            block_offset,
        })
    }

    /// 替换值后的描述符，偏移保持不变
    pub(crate) fn with_value(&self, value: VariableValue) -> Result<Self> {
        if !value.fits(self.variable_type) {
            return Err(SaveError::type_mismatch(&self.name, self.variable_type, value.kind()));
        }
        let mut updated = self.clone();
        updated.val_size = Self::derive_size(&value);
        updated.value = value;
        Ok(updated)
    }

    fn derive_size(value: &VariableValue) -> usize {
        match value {
            VariableValue::Int(_) | VariableValue::Float(_) => 4,
            VariableValue::Bytes(bytes) => bytes.len(),
            VariableValue::Text(text) => text.chars().count(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 别名，未设置或为空白时返回名称
    pub fn alias(&self) -> &str {
        match &self.alias {
            Some(alias) if !alias.trim().is_empty() => alias,
            _ => &self.name,
        }
    }

    pub fn key_offset(&self) -> usize {
        self.key_offset
    }

    pub fn val_offset(&self) -> usize {
        self.val_offset
    }

    pub fn val_size(&self) -> usize {
        self.val_size
    }

    pub fn variable_type(&self) -> VariableType {
        self.variable_type
    }

    pub fn value(&self) -> &VariableValue {
        &self.value
    }

    pub fn block_offset(&self) -> usize {
        self.block_offset
    }

    pub fn is_int(&self) -> bool {
        self.variable_type == VariableType::Integer
    }

    pub fn is_float(&self) -> bool {
        self.variable_type == VariableType::Float
    }

    pub fn is_string(&self) -> bool {
        self.variable_type.is_string()
    }

    /// 值的字节长度（不含长度前缀）
    pub fn val_bytes_length(&self) -> usize {
        self.val_size * self.variable_type.unit_width()
    }

    /// 长度前缀字节数
    pub fn value_prefix(&self) -> usize {
        self.variable_type.value_prefix()
    }

    /// 值字段起始偏移（变长类型指向长度前缀）
    ///
    /// 标量写入在覆盖层中以此为键
    pub fn value_field_offset(&self) -> usize {
        self.val_offset.saturating_sub(self.value_prefix())
    }

    /// 值字段长度（长度前缀 + 值字节）
    pub fn value_field_length(&self) -> usize {
        self.value_prefix() + self.val_bytes_length()
    }

    /// 从 keyOffset 到值末尾的完整磁盘跨度
    pub fn variable_bytes_length(&self) -> usize {
        self.val_offset.saturating_sub(self.key_offset) + self.val_bytes_length()
    }

    /// 值的文本表示
    pub fn value_text(&self) -> String {
        render_value(&self.value, self.variable_type)
    }
}

/// 按类型渲染值：数值为十进制，UID 为十六进制字节对，STREAM 为十六进制，字符串原样输出
pub fn render_value(value: &VariableValue, variable_type: VariableType) -> String {
    match value {
        VariableValue::Int(v) => v.to_string(),
        VariableValue::Float(v) => format!("{:?}", v),
        VariableValue::Text(text) => text.clone(),
        VariableValue::Bytes(bytes) if variable_type == VariableType::Uid => bytes
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" "),
        VariableValue::Bytes(bytes) => bytes.iter().map(|b| format!("{:02X}", b)).collect(),
    }
}

impl std::fmt::Display for VariableInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "name={{{}}}; alias={{{}}}; value={{{}}}; keyOffset={{{}}}, valOffset={{{}}}; valSize={{{}}}; variableType: {{{}}}",
            self.name,
            self.alias(),
            self.value_text(),
            self.key_offset,
            self.val_offset,
            self.val_size,
            self.variable_type
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_geometry_for_string() {
        let var = VariableOptions::new("myPlayerName", VariableType::StringWide16, VariableValue::Text("Avatar".into()))
            .key_offset(100)
            .block_offset(90)
            .build()
            .unwrap();

        assert_eq!(var.val_size(), 6);
        assert_eq!(var.val_offset(), 100 + 4 + 12 + 4);
        assert_eq!(var.val_bytes_length(), 12);
        assert_eq!(var.value_field_offset(), 100 + 4 + 12);
        assert_eq!(var.value_field_length(), 16);
        assert_eq!(var.variable_bytes_length(), 4 + 12 + 4 + 12);
    }

    #[test]
    fn test_derived_geometry_for_scalars() {
        let var = VariableOptions::new("money", VariableType::Integer, VariableValue::Int(10))
            .key_offset(8)
            .build()
            .unwrap();
        assert_eq!(var.val_size(), 4);
        assert_eq!(var.val_offset(), 8 + 4 + 5);
        assert_eq!(var.value_field_offset(), var.val_offset());
        assert_eq!(var.variable_bytes_length(), 4 + 5 + 4);

        let uid = VariableOptions::new("id", VariableType::Uid, VariableValue::Bytes(vec![0; 16]))
            .build()
            .unwrap();
        assert_eq!(uid.val_size(), 16);
        assert_eq!(uid.variable_bytes_length(), 4 + 2 + 16);
    }

    #[test]
    fn test_explicit_offsets_are_kept() {
        let var = VariableOptions::new("blob", VariableType::Stream, VariableValue::Bytes(vec![1, 2, 3]))
            .key_offset(0)
            .val_offset(12)
            .val_size(3)
            .build()
            .unwrap();
        assert_eq!(var.val_offset(), 12);
        assert_eq!(var.variable_bytes_length(), 15);
    }

    #[test]
    fn test_value_type_must_match() {
        let err = VariableOptions::new("hp", VariableType::Float, VariableValue::Int(3))
            .build()
            .unwrap_err();
        assert!(matches!(err, SaveError::TypeMismatch { .. }));

        let err = VariableOptions::new("id", VariableType::Uid, VariableValue::Bytes(vec![0; 4]))
            .build()
            .unwrap_err();
        assert!(matches!(err, SaveError::CorruptRecord(_)));
    }

    #[test]
    fn test_alias_falls_back_to_name() {
        let var = VariableOptions::new("temp", VariableType::Float, VariableValue::Float(1.0))
            .build()
            .unwrap();
        assert_eq!(var.alias(), "temp");

        let var = VariableOptions::new("temp", VariableType::Float, VariableValue::Float(1.0))
            .alias("Strength")
            .build()
            .unwrap();
        assert_eq!(var.alias(), "Strength");
    }

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(&VariableValue::Int(-7), VariableType::Integer), "-7");
        assert_eq!(render_value(&VariableValue::Float(2.0), VariableType::Float), "2.0");
        assert_eq!(
            render_value(&VariableValue::Bytes(vec![0xAB, 0x01]), VariableType::Stream),
            "AB01"
        );
        assert_eq!(
            render_value(&VariableValue::Bytes(vec![0xAB, 0x01]), VariableType::Uid),
            "ab 01"
        );
        assert_eq!(
            render_value(&VariableValue::Text("Avatar".into()), VariableType::String),
            "Avatar"
        );
    }
}
