//! WINDOWS <-> MOBILE 平台转换
//!
//! 两个平台的差别在于宽字符串的字符宽度（2 字节 / 4 字节），
//! 以及移动版按存档 ID 而非名称寻址角色，需要额外的存档 ID 变量。
//! 转换只改变暂存字节的长度，从不修改索引中的偏移量，名称查找在转换前后保持稳定。

use rayon::prelude::*;
use tracing::info;

use crate::codec::{decode_value, encode_value};
use crate::datatypes::{Platform, VariableType, VariableValue};
use crate::utils::{Result, SaveError};
use crate::variable::{VariableInfo, VariableOptions};

use super::overlay::OverlayStore;

/// 重编码后的值字段
struct Reencoded {
    variable: VariableInfo,
    data: Vec<u8>,
}

impl OverlayStore {
    /// 将整个文档转换到目标平台
    ///
    /// - WINDOWS -> MOBILE：在显示名变量的 keyOffset 处插入存档 ID 变量，
    ///   并把所有宽字符串从 2 字节重编码为 4 字节
    /// - MOBILE -> WINDOWS：删除存档 ID 变量，宽字符串重编码回 2 字节
    ///
    /// 已编辑过的字符串通过覆盖层读取。转换到当前平台返回 `InvalidState`。
    pub fn convert_to(&self, target: Platform, save_id: &str) -> Result<()> {
        let current = self.platform();
        if current == target {
            return Err(SaveError::InvalidState(format!(
                "can't convert to same platform ({:?})",
                target
            )));
        }

        let reencoded = self.reencode_wide_strings(current, target)?;

        match target {
            Platform::Mobile => self.insert_save_id(save_id)?,
            Platform::Windows => self.remove_save_ids()?,
        }

        let count = reencoded.len();
        for entry in reencoded {
            self.store_change(&entry.variable, entry.data);
        }
        *self.platform.write() = target;

        info!(from = ?current, to = ?target, strings = count, "platform converted");
        Ok(())
    }

    /// 计算所有非空宽字符串在目标平台上的值字段
    fn reencode_wide_strings(&self, from: Platform, to: Platform) -> Result<Vec<Reencoded>> {
        let wide: Vec<VariableInfo> = self
            .block_info()
            .iter()
            .flat_map(|block| {
                block
                    .value()
                    .iter_variables()
                    .filter(|v| v.variable_type().is_wide_string())
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();

        // 先取出覆盖层快照，再并行编码
        let pending: Vec<(VariableInfo, Option<Vec<u8>>)> = wide
            .into_iter()
            .map(|v| {
                let bytes = self.get_bytes_for(&v);
                (v, bytes)
            })
            .collect();

        let results: Vec<Option<Reencoded>> = pending
            .into_par_iter()
            .map(|(variable, overlay)| Self::reencode(variable, overlay, from, to))
            .collect::<Result<_>>()?;

        Ok(results.into_iter().flatten().collect())
    }

    fn reencode(
        variable: VariableInfo,
        overlay: Option<Vec<u8>>,
        from: Platform,
        to: Platform,
    ) -> Result<Option<Reencoded>> {
        let current = match overlay {
            Some(bytes) => decode_value(&bytes, from.wide_string_type())?,
            None => variable.value().clone(),
        };
        let text = match current {
            VariableValue::Text(text) => text,
            other => {
                return Err(SaveError::type_mismatch(
                    variable.name(),
                    variable.variable_type(),
                    other.kind(),
                ))
            }
        };
        // 空字符串在两种宽度下编码相同
        if text.is_empty() {
            return Ok(None);
        }

        let data = encode_value(
            variable.name(),
            &VariableValue::Text(text),
            to.wide_string_type(),
        )?;
        Ok(Some(Reencoded { variable, data }))
    }

    /// 在显示名变量前插入存档 ID
    fn insert_save_id(&self, save_id: &str) -> Result<()> {
        let config = self.config();
        let display_name = self
            .variable_location(&config.display_name_variable)
            .first()
            .copied()
            .and_then(|block| self.block(block))
            .and_then(|block| block.first(&config.display_name_variable).cloned())
            .ok_or_else(|| SaveError::UnknownVariable(config.display_name_variable.clone()))?;

        let save_id_variable = VariableOptions::new(
            config.save_id_variable.clone(),
            VariableType::String,
            VariableValue::Text(save_id.to_string()),
        )
        .block_offset(display_name.block_offset())
        .key_offset(display_name.key_offset())
        .build()?;

        self.insert_variable(display_name.key_offset(), &save_id_variable, false)
    }

    /// 删除所有存档 ID 变量（解析得到的和本次会话插入的）
    fn remove_save_ids(&self) -> Result<()> {
        let name = self.config().save_id_variable.clone();
        let targets: Vec<VariableInfo> = self
            .block_info()
            .iter()
            .flat_map(|block| {
                let block = block.value();
                let mut found = block.get(&name).to_vec();
                found.extend(block.staging().get(&name).cloned());
                found
            })
            .collect();

        for variable in &targets {
            self.remove_variable(variable)?;
        }
        Ok(())
    }
}
