//! 覆盖层存储
//!
//! 持有块索引、名称位置索引以及稀疏的 偏移量 -> 替换字节 覆盖层。
//! 原始缓冲区从不修改，也不会为单次编辑重新编码整个文档。

use std::collections::{BTreeSet, HashMap};

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::block::Block;
use crate::codec::{decode_int, decode_value, encode_record, encode_value};
use crate::datatypes::{Platform, VariableType, VariableValue};
use crate::index::DocumentIndex;
use crate::utils::{Result, SaveError};
use crate::variable::VariableInfo;

use super::config::OverlayConfig;

/// 按描述符寻址时的作用目标
enum Target {
    /// 索引中的原始变量
    Primary,
    /// 暂存表中的插入（携带当前暂存的描述符）
    Staged(VariableInfo),
}

/// 覆盖层存储
///
/// # 覆盖层语义
/// - `changes[offset]`：写入时替换原始数据 `offset` 处的字节
/// - `values_length_index[offset]`：被替换的原始字节数（插入为 0）
/// - 读取时优先查覆盖层，没有条目时解析期的值是权威值
///
/// # 并发
/// 每个内部结构都是线程安全的，但组合操作（先读后增）不可线性化，
/// 调用方需保证每个文档同时最多只有一个进行中的修改。
#[derive(Debug)]
pub struct OverlayStore {
    config: OverlayConfig,
    block_info: DashMap<usize, Block>,
    variable_location: DashMap<String, Vec<usize>>,
    changes: DashMap<usize, Vec<u8>>,
    values_length_index: DashMap<usize, usize>,
    pub(super) platform: RwLock<Platform>,
}

impl OverlayStore {
    pub fn new() -> Self {
        Self::with_config(OverlayConfig::default())
    }

    pub fn with_config(config: OverlayConfig) -> Self {
        Self {
            config,
            block_info: DashMap::new(),
            variable_location: DashMap::new(),
            changes: DashMap::new(),
            values_length_index: DashMap::new(),
            platform: RwLock::new(Platform::Windows),
        }
    }

    /// 从解析器索引创建
    pub fn from_index(index: DocumentIndex, config: OverlayConfig) -> Result<Self> {
        let store = Self::with_config(config);
        store.load(index)?;
        Ok(store)
    }

    /// 校验并安装解析器索引，清除之前的全部状态
    pub fn load(&self, index: DocumentIndex) -> Result<()> {
        index.validate()?;
        self.clear();
        let block_count = index.blocks.len();
        self.set_block_info(index.blocks);
        self.set_variable_location(index.variable_location);
        info!(blocks = block_count, "document index loaded");
        Ok(())
    }

    /// 重置为空文档以便复用
    pub fn clear(&self) {
        info!(pending = self.changes.len(), "overlay cleared");
        self.block_info.clear();
        self.variable_location.clear();
        self.changes.clear();
        self.values_length_index.clear();
        *self.platform.write() = Platform::Windows;
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    // === 索引访问 ===

    pub fn set_block_info(&self, blocks: HashMap<usize, Block>) {
        self.block_info.clear();
        for (offset, block) in blocks {
            self.block_info.insert(offset, block);
        }
    }

    pub fn set_variable_location(&self, locations: HashMap<String, Vec<usize>>) {
        self.variable_location.clear();
        for (name, blocks) in locations {
            self.variable_location.insert(name, blocks);
        }
    }

    /// 块索引，供外部写入器使用
    pub fn block_info(&self) -> &DashMap<usize, Block> {
        &self.block_info
    }

    /// 块的快照
    pub fn block(&self, offset: usize) -> Option<Block> {
        self.block_info.get(&offset).map(|b| b.value().clone())
    }

    /// 定义该变量的块起始偏移
    pub fn variable_location(&self, name: &str) -> Vec<usize> {
        self.variable_location
            .get(name)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    pub fn platform(&self) -> Platform {
        *self.platform.read()
    }

    /// 直接设置平台（加载移动版存档时使用，不做任何转换）
    pub fn set_platform(&self, platform: Platform) {
        *self.platform.write() = platform;
    }

    // === 写入器接口 ===

    /// 所有覆盖层条目的偏移（有序）
    pub fn changes_key_set(&self) -> BTreeSet<usize> {
        self.changes.iter().map(|entry| *entry.key()).collect()
    }

    pub fn get_bytes(&self, offset: usize) -> Option<Vec<u8>> {
        self.changes.get(&offset).map(|r| r.value().clone())
    }

    /// 变量值字段上的覆盖层条目
    pub fn get_bytes_for(&self, variable: &VariableInfo) -> Option<Vec<u8>> {
        self.get_bytes(variable.value_field_offset())
    }

    /// 偏移 -> 被替换的原始字节数
    pub fn values_length_index(&self) -> HashMap<usize, usize> {
        self.values_length_index
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }

    pub fn original_length(&self, offset: usize) -> Option<usize> {
        self.values_length_index.get(&offset).map(|r| *r.value())
    }

    pub fn has_change(&self, variable: &VariableInfo) -> bool {
        self.changes.contains_key(&variable.value_field_offset())
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    // === 内部辅助 ===

    /// 以值字段起始偏移为键暂存，记录原始值字段长度
    pub(super) fn store_change(&self, variable: &VariableInfo, data: Vec<u8>) {
        self.store_change_at(
            variable.value_field_offset(),
            data,
            variable.value_field_length(),
        );
    }

    fn store_change_at(&self, offset: usize, data: Vec<u8>, previous_length: usize) {
        debug!(
            offset,
            previous_length,
            length = data.len(),
            "staged overlay entry"
        );
        self.changes.insert(offset, data);
        self.values_length_index.insert(offset, previous_length);
    }

    fn discard_change(&self, offset: usize) {
        self.changes.remove(&offset);
        self.values_length_index.remove(&offset);
    }

    fn unknown_in_block(name: &str, block: usize) -> SaveError {
        SaveError::UnknownVariable(format!("{} (block {})", name, block))
    }

    fn ensure_block(&self, block: usize, name: &str) -> Result<()> {
        if self.block_info.contains_key(&block) {
            Ok(())
        } else {
            Err(Self::unknown_in_block(name, block))
        }
    }

    /// 第一个定义该变量的块
    fn first_block(&self, name: &str) -> Result<usize> {
        let block = self
            .variable_location(name)
            .first()
            .copied()
            .ok_or_else(|| SaveError::UnknownVariable(name.to_string()))?;
        self.ensure_block(block, name)?;
        Ok(block)
    }

    fn first_in_block(&self, block: usize, name: &str) -> Result<VariableInfo> {
        let entry = self
            .block_info
            .get(&block)
            .ok_or_else(|| Self::unknown_in_block(name, block))?;
        entry
            .value()
            .first(name)
            .cloned()
            .ok_or_else(|| Self::unknown_in_block(name, block))
    }

    fn first(&self, name: &str) -> Result<VariableInfo> {
        let block = self.first_block(name)?;
        self.first_in_block(block, name)
    }

    /// 块内唯一的变量；块内出现多次时拒绝
    fn single_in_block(&self, block: usize, name: &str) -> Result<VariableInfo> {
        let entry = self
            .block_info
            .get(&block)
            .ok_or_else(|| Self::unknown_in_block(name, block))?;
        match entry.value().get(name) {
            [] => Err(Self::unknown_in_block(name, block)),
            [variable] => Ok(variable.clone()),
            _ => {
                warn!(variable = name, block, "ambiguous block-scoped write rejected");
                Err(SaveError::MultipleDefinitions(name.to_string()))
            }
        }
    }

    /// 仅按名称寻址时的唯一变量；多个块定义该名称时拒绝
    fn single(&self, name: &str) -> Result<VariableInfo> {
        let locations = self.variable_location(name);
        if locations.len() > 1 {
            warn!(variable = name, blocks = locations.len(), "ambiguous write rejected");
            return Err(SaveError::MultipleDefinitions(name.to_string()));
        }
        let block = self.first_block(name)?;
        self.single_in_block(block, name)
    }

    /// 暂存表中与描述符对应的条目（按名称与 keyOffset 匹配）
    fn staged_descriptor(&self, variable: &VariableInfo) -> Option<VariableInfo> {
        self.block_info.get(&variable.block_offset()).and_then(|block| {
            block
                .value()
                .staging()
                .get(variable.name())
                .filter(|staged| staged.key_offset() == variable.key_offset())
                .cloned()
        })
    }

    /// 确定按描述符寻址的操作作用于原始变量还是暂存插入
    fn resolve(&self, variable: &VariableInfo) -> Result<Target> {
        self.ensure_block(variable.block_offset(), variable.name())?;
        if let Some(staged) = self.staged_descriptor(variable) {
            return Ok(Target::Staged(staged));
        }
        let indexed = self
            .block_info
            .get(&variable.block_offset())
            .map(|block| {
                block
                    .value()
                    .get(variable.name())
                    .iter()
                    .any(|v| v.key_offset() == variable.key_offset())
            })
            .unwrap_or(false);
        if indexed {
            Ok(Target::Primary)
        } else {
            Err(Self::unknown_in_block(variable.name(), variable.block_offset()))
        }
    }

    /// 宽字符串在当前平台上的实际编码
    pub(super) fn effective_type(&self, variable: &VariableInfo) -> VariableType {
        let declared = variable.variable_type();
        if declared.is_wide_string() {
            self.platform().wide_string_type()
        } else {
            declared
        }
    }

    /// 读取值：覆盖层优先，否则为解析期的值
    pub(crate) fn read_value(&self, variable: &VariableInfo) -> Result<VariableValue> {
        if let Some(staged) = self.staged_descriptor(variable) {
            return Ok(staged.value().clone());
        }
        match self.get_bytes_for(variable) {
            Some(bytes) => decode_value(&bytes, self.effective_type(variable)),
            None => Ok(variable.value().clone()),
        }
    }

    fn write_value(&self, variable: &VariableInfo, value: VariableValue) -> Result<()> {
        let data = encode_value(variable.name(), &value, self.effective_type(variable))?;
        self.store_change(variable, data);
        Ok(())
    }

    fn write_target(&self, variable: &VariableInfo, target: Target, value: VariableValue) -> Result<()> {
        match target {
            Target::Primary => self.write_value(variable, value),
            Target::Staged(staged) => self.restage(&staged, value),
        }
    }

    /// 在插入偏移处用新值重新编码暂存记录
    fn restage(&self, staged: &VariableInfo, value: VariableValue) -> Result<()> {
        let updated = staged.with_value(value)?;
        let offset = staged.key_offset();
        let old = encode_record(staged.name(), staged.value(), staged.variable_type())?;
        let new = encode_record(updated.name(), updated.value(), updated.variable_type())?;

        let mut data = self.get_bytes(offset).unwrap_or_default();
        let position = Self::find_record(&data, &old, staged)?;
        let tail = data.split_off(position + old.len());
        data.truncate(position);
        data.extend_from_slice(&new);
        data.extend_from_slice(&tail);
        let previous_length = self.original_length(offset).unwrap_or(0);
        self.store_change_at(offset, data, previous_length);

        if let Some(mut block) = self.block_info.get_mut(&staged.block_offset()) {
            block.stage(updated);
        }
        Ok(())
    }

    fn find_record(data: &[u8], record: &[u8], variable: &VariableInfo) -> Result<usize> {
        data.windows(record.len())
            .position(|window| window == record)
            .ok_or_else(|| {
                SaveError::CorruptRecord(format!(
                    "staged record for '{}' not found at offset {}",
                    variable.name(),
                    variable.key_offset()
                ))
            })
    }

    fn expect_type(variable: &VariableInfo, matches: bool, requested: &str) -> Result<()> {
        if matches {
            Ok(())
        } else {
            Err(SaveError::type_mismatch(
                variable.name(),
                variable.variable_type(),
                requested,
            ))
        }
    }

    fn read_string(&self, variable: &VariableInfo) -> Result<String> {
        Self::expect_type(variable, variable.is_string(), "string")?;
        match self.read_value(variable)? {
            VariableValue::Text(text) => Ok(text),
            other => Err(SaveError::type_mismatch(variable.name(), variable.variable_type(), other.kind())),
        }
    }

    fn read_int(&self, variable: &VariableInfo) -> Result<i32> {
        Self::expect_type(variable, variable.is_int(), "integer")?;
        match self.read_value(variable)? {
            VariableValue::Int(v) => Ok(v),
            other => Err(SaveError::type_mismatch(variable.name(), variable.variable_type(), other.kind())),
        }
    }

    fn read_float(&self, variable: &VariableInfo) -> Result<f32> {
        Self::expect_type(variable, variable.is_float(), "float")?;
        match self.read_value(variable)? {
            VariableValue::Float(v) => Ok(v),
            other => Err(SaveError::type_mismatch(variable.name(), variable.variable_type(), other.kind())),
        }
    }

    fn read_bytes(&self, variable: &VariableInfo) -> Result<Vec<u8>> {
        Self::expect_type(variable, variable.variable_type() == VariableType::Uid, "uid")?;
        match self.read_value(variable)? {
            VariableValue::Bytes(bytes) => Ok(bytes),
            other => Err(SaveError::type_mismatch(variable.name(), variable.variable_type(), other.kind())),
        }
    }

    // === 读取 ===

    pub fn get_string(&self, name: &str) -> Result<String> {
        self.read_string(&self.first(name)?)
    }

    pub fn get_int(&self, name: &str) -> Result<i32> {
        self.read_int(&self.first(name)?)
    }

    pub fn get_float(&self, name: &str) -> Result<f32> {
        self.read_float(&self.first(name)?)
    }

    pub fn get_uid(&self, name: &str) -> Result<Vec<u8>> {
        self.read_bytes(&self.first(name)?)
    }

    pub fn get_string_in_block(&self, block: usize, name: &str) -> Result<String> {
        self.read_string(&self.first_in_block(block, name)?)
    }

    pub fn get_int_in_block(&self, block: usize, name: &str) -> Result<i32> {
        self.read_int(&self.first_in_block(block, name)?)
    }

    pub fn get_float_in_block(&self, block: usize, name: &str) -> Result<f32> {
        self.read_float(&self.first_in_block(block, name)?)
    }

    pub fn get_int_var(&self, variable: &VariableInfo) -> Result<i32> {
        self.read_int(variable)
    }

    pub fn get_float_var(&self, variable: &VariableInfo) -> Result<f32> {
        self.read_float(variable)
    }

    /// 角色显示名
    pub fn character_name(&self) -> Result<String> {
        self.get_string(&self.config.display_name_variable)
    }

    /// 第一个定义该名称的块中，该名称的所有出现（按出现顺序）
    fn occurrences_in_first_block(&self, name: &str) -> Vec<VariableInfo> {
        let Some(block) = self.variable_location(name).first().copied() else {
            return Vec::new();
        };
        self.block_info
            .get(&block)
            .map(|b| b.value().get(name).to_vec())
            .unwrap_or_default()
    }

    pub fn string_values_from_block(&self, name: &str) -> Result<Vec<String>> {
        self.occurrences_in_first_block(name)
            .iter()
            .filter(|v| v.is_string())
            .map(|v| self.read_string(v))
            .collect()
    }

    pub fn int_values_from_block(&self, name: &str) -> Result<Vec<i32>> {
        self.occurrences_in_first_block(name)
            .iter()
            .filter(|v| v.is_int())
            .map(|v| self.read_int(v))
            .collect()
    }

    pub fn uid_values_from_block(&self, name: &str) -> Result<Vec<Vec<u8>>> {
        self.occurrences_in_first_block(name)
            .iter()
            .filter(|v| v.variable_type() == VariableType::Uid)
            .map(|v| self.read_bytes(v))
            .collect()
    }

    // === 写入 ===

    pub fn set_string(&self, name: &str, value: &str) -> Result<()> {
        let variable = self.single(name)?;
        self.write_string(&variable, value)
    }

    pub fn set_string_in_block(&self, block: usize, name: &str, value: &str) -> Result<()> {
        let variable = self.single_in_block(block, name)?;
        self.write_string(&variable, value)
    }

    fn write_string(&self, variable: &VariableInfo, value: &str) -> Result<()> {
        Self::expect_type(variable, variable.is_string(), "string")?;
        self.write_value(variable, VariableValue::Text(value.to_string()))
    }

    pub fn set_int(&self, name: &str, value: i32) -> Result<()> {
        let variable = self.single(name)?;
        self.set_int_var(&variable, value)
    }

    pub fn set_int_in_block(&self, block: usize, name: &str, value: i32) -> Result<()> {
        let variable = self.single_in_block(block, name)?;
        self.set_int_var(&variable, value)
    }

    /// 直接按描述符写入整数
    ///
    /// 描述符必须是所属块中的原始变量或暂存插入；暂存插入在其插入偏移处重新编码
    pub fn set_int_var(&self, variable: &VariableInfo, value: i32) -> Result<()> {
        let target = self.resolve(variable)?;
        Self::expect_type(variable, variable.is_int(), "integer")?;
        self.write_target(variable, target, VariableValue::Int(value))
    }

    pub fn set_float(&self, name: &str, value: f32) -> Result<()> {
        let variable = self.single(name)?;
        self.set_float_var(&variable, value)
    }

    pub fn set_float_in_block(&self, block: usize, name: &str, value: f32) -> Result<()> {
        let variable = self.single_in_block(block, name)?;
        self.set_float_var(&variable, value)
    }

    pub fn set_float_var(&self, variable: &VariableInfo, value: f32) -> Result<()> {
        let target = self.resolve(variable)?;
        Self::expect_type(variable, variable.is_float(), "float")?;
        self.write_target(variable, target, VariableValue::Float(value))
    }

    /// 读取当前值（考虑覆盖层）并加 1
    ///
    /// 用于存档 ID 等单调计数器。覆盖层条目不足 4 字节视为损坏。
    pub fn increment_int(&self, variable: &VariableInfo) -> Result<()> {
        let target = self.resolve(variable)?;
        Self::expect_type(
            variable,
            variable.is_int() && variable.val_size() == 4,
            "integer",
        )?;

        let overlay = match &target {
            Target::Primary => self.get_bytes_for(variable),
            Target::Staged(_) => None,
        };
        let parsed = match &target {
            Target::Primary => variable.value(),
            Target::Staged(staged) => staged.value(),
        };
        let current = match overlay {
            Some(bytes) if bytes.len() < 4 => {
                return Err(SaveError::CorruptRecord(format!(
                    "overlay entry for '{}' holds {} bytes, expected 4",
                    variable.name(),
                    bytes.len()
                )));
            }
            Some(bytes) => decode_int(&bytes)?,
            None => match parsed {
                VariableValue::Int(v) => *v,
                other => {
                    return Err(SaveError::type_mismatch(variable.name(), variable.variable_type(), other.kind()))
                }
            },
        };

        self.write_target(variable, target, VariableValue::Int(current.wrapping_add(1)))
    }

    // === 插入与删除 ===

    /// 在 `offset` 处插入新变量记录
    ///
    /// 默认追加在该偏移已暂存的字节之后；`overwrite` 时替换它们，
    /// 被替换记录的描述符同时撤出暂存表。
    /// 描述符登记到所属块的暂存表，普通名称查找看不到它。
    /// 描述符的 keyOffset 必须等于插入偏移。
    /// 宽字符串不能直接插入，只能经由平台转换产生。
    pub fn insert_variable(&self, offset: usize, variable: &VariableInfo, overwrite: bool) -> Result<()> {
        self.ensure_block(variable.block_offset(), variable.name())?;
        if variable.key_offset() != offset {
            return Err(SaveError::InvalidState(format!(
                "variable '{}' has key offset {} but is inserted at {}",
                variable.name(),
                variable.key_offset(),
                offset
            )));
        }
        if variable.variable_type().is_wide_string() {
            return Err(SaveError::InvalidState(format!(
                "wide string '{}' can't be inserted directly",
                variable.name()
            )));
        }

        let record = encode_record(variable.name(), variable.value(), variable.variable_type())?;
        let mut data = if overwrite {
            for mut block in self.block_info.iter_mut() {
                block.unstage_at(offset);
            }
            Vec::new()
        } else {
            self.get_bytes(offset).unwrap_or_default()
        };
        data.extend_from_slice(&record);

        // 已被替换的原始跨度保持不变
        let previous_length = self.original_length(offset).unwrap_or(0);
        self.store_change_at(offset, data, previous_length);

        if let Some(mut block) = self.block_info.get_mut(&variable.block_offset()) {
            block.stage(variable.clone());
        }
        Ok(())
    }

    /// 删除变量
    ///
    /// 原始变量：在 keyOffset 处以空字节替换其完整跨度，并丢弃其值上的待定编辑。
    /// 暂存变量：从该偏移的暂存字节中撤回其记录。
    pub fn remove_variable(&self, variable: &VariableInfo) -> Result<()> {
        if let Target::Staged(staged) = self.resolve(variable)? {
            return self.withdraw_insertion(&staged);
        }

        let offset = variable.key_offset();
        self.discard_change(variable.value_field_offset());
        // 同一偏移处已暂存的插入内容保留
        let data = self.get_bytes(offset).unwrap_or_default();
        self.store_change_at(offset, data, variable.variable_bytes_length());
        Ok(())
    }

    fn withdraw_insertion(&self, variable: &VariableInfo) -> Result<()> {
        let offset = variable.key_offset();
        let record = encode_record(variable.name(), variable.value(), variable.variable_type())?;
        let mut data = self.get_bytes(offset).unwrap_or_default();

        let position = Self::find_record(&data, &record, variable)?;
        data.drain(position..position + record.len());

        let previous_length = self.original_length(offset).unwrap_or(0);
        if data.is_empty() && previous_length == 0 {
            self.discard_change(offset);
        } else {
            self.store_change_at(offset, data, previous_length);
        }

        if let Some(mut block) = self.block_info.get_mut(&variable.block_offset()) {
            block.unstage(variable.name());
        }
        Ok(())
    }

    /// 删除整个块
    ///
    /// 丢弃块跨度内的所有覆盖层条目，然后在块起始处记录一次空字节替换
    pub fn remove_block(&self, offset: usize) -> Result<()> {
        let (start, end, size) = {
            let block = self
                .block_info
                .get(&offset)
                .ok_or_else(|| SaveError::UnknownVariable(format!("block {}", offset)))?;
            (block.start(), block.end(), block.size())
        };

        self.changes.retain(|key, _| !(start..end).contains(key));
        self.values_length_index
            .retain(|key, _| !(start..end).contains(key));
        if let Some(mut block) = self.block_info.get_mut(&offset) {
            block.clear_staging();
        }

        self.store_change_at(start, Vec::new(), size);
        Ok(())
    }

    // === 临时属性 ===

    /// 在临时属性块中按别名查找
    fn temp_variables(&self, alias: &str) -> Vec<VariableInfo> {
        for start in self.variable_location(&self.config.temp_block_variable) {
            if let Some(block) = self.block_info.get(&start) {
                let found = block.value().variables_by_alias(alias);
                if !found.is_empty() {
                    return found;
                }
            }
        }
        Vec::new()
    }

    /// 读取临时属性（浮点值四舍五入）
    pub fn get_temp_attr(&self, alias: &str) -> Result<i32> {
        let not_found = || SaveError::UnknownVariable(format!("attribute {}", alias));
        let found = self.temp_variables(alias);
        let [variable] = found.as_slice() else {
            return Err(not_found());
        };

        let value = match variable.variable_type() {
            VariableType::Float => self.read_float(variable)?.round() as i32,
            VariableType::Integer => self.read_int(variable)?,
            other => return Err(SaveError::type_mismatch(variable.name(), other, "integer or float")),
        };
        if value < 0 {
            return Err(not_found());
        }
        Ok(value)
    }

    pub fn set_temp_attr(&self, alias: &str, value: i32) -> Result<()> {
        let found = self.temp_variables(alias);
        let variable = found
            .first()
            .ok_or_else(|| SaveError::UnknownVariable(format!("attribute {}", alias)))?;

        match variable.variable_type() {
            VariableType::Float => self.set_float_var(variable, value as f32),
            VariableType::Integer => self.set_int_var(variable, value),
            other => Err(SaveError::type_mismatch(variable.name(), other, "integer or float")),
        }
    }
}

impl Default for OverlayStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for OverlayStore {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            block_info: self.block_info.clone(),
            variable_location: self.variable_location.clone(),
            changes: self.changes.clone(),
            values_length_index: self.values_length_index.clone(),
            platform: RwLock::new(self.platform()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::VariableOptions;

    fn int_var(name: &str, block: usize, key_offset: usize, value: i32) -> VariableInfo {
        VariableOptions::new(name, VariableType::Integer, VariableValue::Int(value))
            .block_offset(block)
            .key_offset(key_offset)
            .build()
            .unwrap()
    }

    fn store_with(blocks: Vec<Block>) -> OverlayStore {
        let mut index = DocumentIndex::new();
        for block in blocks {
            index.insert_block(block);
        }
        OverlayStore::from_index(index, OverlayConfig::default()).unwrap()
    }

    #[test]
    fn test_overlay_precedence() {
        let mut block = Block::new(0, 100);
        block.push_variable(int_var("money", 0, 4, 10));
        let store = store_with(vec![block]);

        assert_eq!(store.get_int("money").unwrap(), 10);
        store.set_int("money", 5).unwrap();
        assert_eq!(store.get_int("money").unwrap(), 5);
        assert_eq!(store.original_length(4 + 4 + 5), Some(4));
    }

    #[test]
    fn test_unknown_and_mismatch() {
        let mut block = Block::new(0, 100);
        block.push_variable(int_var("money", 0, 4, 10));
        let store = store_with(vec![block]);

        assert!(matches!(store.get_int("nothing"), Err(SaveError::UnknownVariable(_))));
        assert!(matches!(store.get_float("money"), Err(SaveError::TypeMismatch { .. })));
        assert!(matches!(store.set_string("money", "x"), Err(SaveError::TypeMismatch { .. })));
        assert!(matches!(store.set_int_in_block(50, "money", 1), Err(SaveError::UnknownVariable(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_increment_reads_overlay() {
        let mut block = Block::new(0, 100);
        let counter = int_var("saveId", 0, 4, 41);
        block.push_variable(counter.clone());
        let store = store_with(vec![block]);

        store.increment_int(&counter).unwrap();
        store.increment_int(&counter).unwrap();
        assert_eq!(store.get_int("saveId").unwrap(), 43);
    }

    #[test]
    fn test_increment_on_short_entry_is_corrupt() {
        let mut block = Block::new(0, 100);
        let counter = int_var("saveId", 0, 4, 41);
        block.push_variable(counter.clone());
        let store = store_with(vec![block]);

        store.store_change_at(counter.value_field_offset(), vec![1, 2], 4);
        assert!(matches!(store.increment_int(&counter), Err(SaveError::CorruptRecord(_))));
    }

    #[test]
    fn test_increment_wraps() {
        let mut block = Block::new(0, 100);
        let counter = int_var("saveId", 0, 4, i32::MAX);
        block.push_variable(counter.clone());
        let store = store_with(vec![block]);

        store.increment_int(&counter).unwrap();
        assert_eq!(store.get_int_var(&counter).unwrap(), i32::MIN);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut block = Block::new(0, 100);
        block.push_variable(int_var("money", 0, 4, 10));
        let store = store_with(vec![block]);
        store.set_int("money", 1).unwrap();
        store.set_platform(Platform::Mobile);

        store.clear();
        assert!(store.is_empty());
        assert!(store.block_info().is_empty());
        assert!(store.variable_location("money").is_empty());
        assert_eq!(store.platform(), Platform::Windows);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut block = Block::new(0, 100);
        block.push_variable(int_var("money", 0, 4, 10));
        let store = store_with(vec![block]);

        let snapshot = store.clone();
        store.set_int("money", 99).unwrap();
        assert_eq!(snapshot.get_int("money").unwrap(), 10);
        assert_eq!(store.get_int("money").unwrap(), 99);
    }

    #[test]
    fn test_load_rejects_corrupt_index() {
        let mut index = DocumentIndex::new();
        index.variable_location.insert("ghost".to_string(), vec![7]);
        let store = OverlayStore::new();
        assert!(matches!(store.load(index), Err(SaveError::CorruptRecord(_))));
    }
}
