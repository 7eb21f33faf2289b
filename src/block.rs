use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::variable::VariableInfo;

/// 块结构
///
/// 以起始偏移寻址的作用域。同一名称在块内可以合法地出现多次，
/// 因此每个名称对应一个按出现顺序排列的列表。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// 块起始偏移
    start: usize,
    /// 块在原始数据中的字节跨度
    size: usize,
    /// 名称 -> 出现列表
    variables: HashMap<String, Vec<VariableInfo>>,
    /// 编辑期间插入、尚未写入文件的变量
    #[serde(default)]
    staging: HashMap<String, VariableInfo>,
}

impl Block {
    pub fn new(start: usize, size: usize) -> Self {
        Self {
            start,
            size,
            variables: HashMap::new(),
            staging: HashMap::new(),
        }
    }

    /// 由解析器在构建索引时调用，按出现顺序追加
    pub fn push_variable(&mut self, variable: VariableInfo) {
        self.variables
            .entry(variable.name().to_string())
            .or_default()
            .push(variable);
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// 块结束位置（不含）
    pub fn end(&self) -> usize {
        self.start + self.size
    }

    pub fn contains_offset(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end()
    }

    pub fn variables(&self) -> &HashMap<String, Vec<VariableInfo>> {
        &self.variables
    }

    /// 名称的所有出现
    pub fn get(&self, name: &str) -> &[VariableInfo] {
        self.variables.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first(&self, name: &str) -> Option<&VariableInfo> {
        self.get(name).first()
    }

    pub fn occurrences(&self, name: &str) -> usize {
        self.get(name).len()
    }

    /// 按出现顺序遍历块内全部变量
    pub fn iter_variables(&self) -> impl Iterator<Item = &VariableInfo> {
        let mut all: Vec<&VariableInfo> = self.variables.values().flatten().collect();
        all.sort_by_key(|v| v.key_offset());
        all.into_iter()
    }

    pub fn variable_count(&self) -> usize {
        self.variables.values().map(Vec::len).sum()
    }

    /// 按别名查找（别名未设置时等同于名称）
    pub fn variables_by_alias(&self, alias: &str) -> Vec<VariableInfo> {
        self.iter_variables()
            .filter(|v| v.alias() == alias)
            .cloned()
            .collect()
    }

    pub fn staging(&self) -> &HashMap<String, VariableInfo> {
        &self.staging
    }

    pub(crate) fn stage(&mut self, variable: VariableInfo) {
        self.staging.insert(variable.name().to_string(), variable);
    }

    pub(crate) fn unstage(&mut self, name: &str) -> Option<VariableInfo> {
        self.staging.remove(name)
    }

    /// 撤销插入在 `offset` 处的全部暂存变量
    pub(crate) fn unstage_at(&mut self, offset: usize) {
        self.staging.retain(|_, v| v.key_offset() != offset);
    }

    pub(crate) fn clear_staging(&mut self) {
        self.staging.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{VariableType, VariableValue};
    use crate::variable::VariableOptions;

    fn int_var(name: &str, key_offset: usize, value: i32) -> VariableInfo {
        VariableOptions::new(name, VariableType::Integer, VariableValue::Int(value))
            .key_offset(key_offset)
            .block_offset(0)
            .build()
            .unwrap()
    }

    #[test]
    fn test_duplicates_keep_order() {
        let mut block = Block::new(0, 100);
        block.push_variable(int_var("x", 10, 1));
        block.push_variable(int_var("y", 23, 2));
        block.push_variable(int_var("x", 36, 3));

        assert_eq!(block.occurrences("x"), 2);
        assert_eq!(block.first("x").unwrap().value(), &VariableValue::Int(1));
        assert_eq!(block.get("x")[1].key_offset(), 36);
        assert_eq!(block.variable_count(), 3);
        assert!(block.get("missing").is_empty());

        let order: Vec<usize> = block.iter_variables().map(|v| v.key_offset()).collect();
        assert_eq!(order, vec![10, 23, 36]);
    }

    #[test]
    fn test_staging_is_separate() {
        let mut block = Block::new(0, 100);
        block.stage(int_var("staged", 10, 1));
        assert!(block.first("staged").is_none());
        assert!(block.staging().contains_key("staged"));
        assert!(block.unstage("staged").is_some());
        assert!(block.staging().is_empty());
    }

    #[test]
    fn test_variables_by_alias() {
        let mut block = Block::new(0, 100);
        let aliased = VariableOptions::new("temp", VariableType::Float, VariableValue::Float(50.0))
            .alias("Strength")
            .key_offset(10)
            .build()
            .unwrap();
        block.push_variable(aliased);
        block.push_variable(int_var("temp", 30, 1));

        assert_eq!(block.variables_by_alias("Strength").len(), 1);
        assert_eq!(block.variables_by_alias("temp").len(), 1);
        assert!(block.contains_offset(99));
        assert!(!block.contains_offset(100));
    }
}
