//! 解析器交接索引
//!
//! 外部解析器扫描一次原始数据后构建块索引与名称位置索引，
//! 覆盖层以此作为“无待定编辑”时的真实数据。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::utils::{Result, SaveError};
use crate::variable::VariableInfo;

/// 一次扫描产生的文档索引
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentIndex {
    /// 块起始偏移 -> 块
    pub blocks: HashMap<usize, Block>,
    /// 变量名 -> 定义该变量的块起始偏移（按出现顺序）
    pub variable_location: HashMap<String, Vec<usize>>,
}

impl DocumentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加块并登记其中的全部变量名
    pub fn insert_block(&mut self, block: Block) {
        let start = block.start();
        for variable in block.iter_variables() {
            let locations = self
                .variable_location
                .entry(variable.name().to_string())
                .or_default();
            if !locations.contains(&start) {
                locations.push(start);
            }
        }
        self.blocks.insert(start, block);
    }

    /// 从 JSON 读取索引并校验
    pub fn from_json(json: &str) -> Result<Self> {
        let index: DocumentIndex = serde_json::from_str(json)?;
        index.validate()?;
        Ok(index)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// 校验索引完整性
    ///
    /// 不完整或自相矛盾的索引视为损坏数据，加载时直接失败
    pub fn validate(&self) -> Result<()> {
        for (offset, block) in &self.blocks {
            if *offset != block.start() {
                return Err(SaveError::CorruptRecord(format!(
                    "block indexed at {} declares start {}",
                    offset,
                    block.start()
                )));
            }
            for variable in block.iter_variables() {
                Self::validate_variable(block, variable)?;
            }
            for name in block.variables().keys() {
                self.validate_location(block, name)?;
            }
        }

        for (name, locations) in &self.variable_location {
            if locations.is_empty() {
                return Err(SaveError::CorruptRecord(format!(
                    "variable '{}' has an empty location list",
                    name
                )));
            }
            for start in locations {
                let block = self.blocks.get(start).ok_or_else(|| {
                    SaveError::CorruptRecord(format!(
                        "variable '{}' points to unknown block {}",
                        name, start
                    ))
                })?;
                if block.occurrences(name) == 0 {
                    return Err(SaveError::CorruptRecord(format!(
                        "block {} does not define variable '{}'",
                        start, name
                    )));
                }
            }
        }
        Ok(())
    }

    /// 块中定义的每个名称都必须在位置索引中登记该块
    fn validate_location(&self, block: &Block, name: &str) -> Result<()> {
        let registered = self
            .variable_location
            .get(name)
            .map(|locations| locations.contains(&block.start()))
            .unwrap_or(false);
        if registered {
            Ok(())
        } else {
            Err(SaveError::CorruptRecord(format!(
                "block {} defines variable '{}' missing from the location index",
                block.start(),
                name
            )))
        }
    }

    fn validate_variable(block: &Block, variable: &VariableInfo) -> Result<()> {
        if variable.block_offset() != block.start() {
            return Err(SaveError::CorruptRecord(format!(
                "variable '{}' claims block {} but is stored in block {}",
                variable.name(),
                variable.block_offset(),
                block.start()
            )));
        }
        let end = variable.key_offset() + variable.variable_bytes_length();
        if !block.contains_offset(variable.key_offset()) || end > block.end() {
            return Err(SaveError::CorruptRecord(format!(
                "variable '{}' [{}..{}) lies outside block [{}..{})",
                variable.name(),
                variable.key_offset(),
                end,
                block.start(),
                block.end()
            )));
        }
        if variable.val_offset() < variable.key_offset() + 4 + variable.name().len() {
            return Err(SaveError::CorruptRecord(format!(
                "variable '{}' value offset {} overlaps its key",
                variable.name(),
                variable.val_offset()
            )));
        }
        Ok(())
    }
}
