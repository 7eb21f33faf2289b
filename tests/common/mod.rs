//! 集成测试共用工具
//!
//! - `DocumentBuilder`：写入真实的 TLV 记录并同时构建索引（充当外部解析器）
//! - `splice`：按覆盖层拼接输出（充当外部写入器）

#![allow(dead_code)]

use save_overlay::{
    Block, DocumentIndex, OverlayConfig, OverlayStore, VariableInfo, VariableOptions, VariableType,
    VariableValue,
};

pub struct DocumentBuilder {
    buffer: Vec<u8>,
    index: DocumentIndex,
    open: Vec<Block>,
    pending_alias: Option<String>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            index: DocumentIndex::new(),
            open: Vec::new(),
            pending_alias: None,
        }
    }

    fn write_key(&mut self, name: &str) -> usize {
        let key_offset = self.buffer.len();
        self.buffer
            .extend_from_slice(&(name.len() as i32).to_le_bytes());
        self.buffer.extend_from_slice(name.as_bytes());
        key_offset
    }

    fn current_block(&self) -> usize {
        self.open.last().expect("no open block").start()
    }

    fn register(
        &mut self,
        name: &str,
        key_offset: usize,
        val_offset: usize,
        val_size: usize,
        variable_type: VariableType,
        value: VariableValue,
    ) -> VariableInfo {
        let mut options = VariableOptions::new(name, variable_type, value);
        if let Some(alias) = self.pending_alias.take() {
            options = options.alias(alias);
        }
        let variable = options
            .block_offset(self.current_block())
            .key_offset(key_offset)
            .val_offset(val_offset)
            .val_size(val_size)
            .build()
            .unwrap();
        self.open.last_mut().unwrap().push_variable(variable.clone());
        variable
    }

    /// 为下一个写入的变量设置别名
    pub fn alias(&mut self, alias: &str) -> &mut Self {
        self.pending_alias = Some(alias.to_string());
        self
    }

    /// 以 begin_block 标记开始一个块，返回块起始偏移
    pub fn begin_block(&mut self) -> usize {
        let start = self.write_key("begin_block");
        self.buffer.extend_from_slice(&0xB01DFACEu32.to_le_bytes());
        self.open.push(Block::new(start, 0));
        start
    }

    /// 以 end_block 标记结束当前块
    pub fn end_block(&mut self) -> usize {
        self.write_key("end_block");
        self.buffer.extend_from_slice(&0xDEADC0DEu32.to_le_bytes());
        let open = self.open.pop().expect("no open block");
        let mut block = Block::new(open.start(), self.buffer.len() - open.start());
        for variable in open.iter_variables() {
            block.push_variable(variable.clone());
        }
        let start = block.start();
        self.index.insert_block(block);
        start
    }

    pub fn int(&mut self, name: &str, value: i32) -> VariableInfo {
        let key_offset = self.write_key(name);
        let val_offset = self.buffer.len();
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self.register(name, key_offset, val_offset, 4, VariableType::Integer, VariableValue::Int(value))
    }

    pub fn float(&mut self, name: &str, value: f32) -> VariableInfo {
        let key_offset = self.write_key(name);
        let val_offset = self.buffer.len();
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self.register(name, key_offset, val_offset, 4, VariableType::Float, VariableValue::Float(value))
    }

    pub fn uid(&mut self, name: &str, value: [u8; 16]) -> VariableInfo {
        let key_offset = self.write_key(name);
        let val_offset = self.buffer.len();
        self.buffer.extend_from_slice(&value);
        self.register(name, key_offset, val_offset, 16, VariableType::Uid, VariableValue::Bytes(value.to_vec()))
    }

    pub fn string(&mut self, name: &str, text: &str) -> VariableInfo {
        self.text(name, text, VariableType::String)
    }

    pub fn wide16(&mut self, name: &str, text: &str) -> VariableInfo {
        self.text(name, text, VariableType::StringWide16)
    }

    pub fn wide32(&mut self, name: &str, text: &str) -> VariableInfo {
        self.text(name, text, VariableType::StringWide32)
    }

    fn text(&mut self, name: &str, text: &str, variable_type: VariableType) -> VariableInfo {
        let key_offset = self.write_key(name);
        let units = text.chars().count();
        self.buffer.extend_from_slice(&(units as i32).to_le_bytes());
        let val_offset = self.buffer.len();
        for c in text.chars() {
            match variable_type {
                VariableType::String => self.buffer.push(c as u8),
                VariableType::StringWide16 => self.buffer.extend_from_slice(&(c as u16).to_le_bytes()),
                _ => self.buffer.extend_from_slice(&(c as u32).to_le_bytes()),
            }
        }
        self.register(name, key_offset, val_offset, units, variable_type, VariableValue::Text(text.to_string()))
    }

    pub fn finish(self) -> (Vec<u8>, DocumentIndex) {
        assert!(self.open.is_empty(), "unterminated block");
        (self.buffer, self.index)
    }

    pub fn into_store(self) -> (Vec<u8>, OverlayStore) {
        let (buffer, index) = self.finish();
        let store = OverlayStore::from_index(index, OverlayConfig::default()).unwrap();
        (buffer, store)
    }
}

/// 按偏移顺序把覆盖层拼接进原始数据
pub fn splice(original: &[u8], store: &OverlayStore) -> Vec<u8> {
    let lengths = store.values_length_index();
    let mut output = Vec::with_capacity(original.len());
    let mut position = 0;

    for offset in store.changes_key_set() {
        if offset < position {
            continue;
        }
        output.extend_from_slice(&original[position..offset]);
        output.extend_from_slice(&store.get_bytes(offset).unwrap());
        position = offset + lengths[&offset];
    }
    output.extend_from_slice(&original[position..]);
    output
}

/// 在数据中查找变量名的 key 偏移
pub fn find_key(data: &[u8], name: &str) -> Option<usize> {
    let mut key = (name.len() as i32).to_le_bytes().to_vec();
    key.extend_from_slice(name.as_bytes());
    data.windows(key.len()).position(|w| w == key.as_slice())
}

/// 读取 key 之后的 4 字节小端整数（整数值或字符串长度前缀）
pub fn read_i32_after_key(data: &[u8], name: &str) -> i32 {
    let at = find_key(data, name).unwrap() + 4 + name.len();
    i32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}
