use crate::block::Block;
use crate::editor::OverlayStore;
use crate::variable::{render_value, VariableInfo};
use std::fmt::Write;

/// 覆盖层结构调试器
pub struct OverlayDebugger;

impl OverlayDebugger {
    /// 生成文档结构与待定覆盖层的文本 dump
    ///
    /// 变量值通过覆盖层读取，反映当前编辑后的状态
    pub fn dump(store: &OverlayStore) -> Result<String, std::fmt::Error> {
        let mut output = String::new();

        Self::write_header_info(&mut output, store)?;
        Self::write_blocks_info(&mut output, store)?;
        Self::write_changes_info(&mut output, store)?;

        Ok(output)
    }

    /// 写入头部信息
    fn write_header_info(output: &mut String, store: &OverlayStore) -> std::fmt::Result {
        writeln!(output, "=== 存档覆盖层dump ===")?;
        writeln!(output, "平台: {:?}", store.platform())?;
        writeln!(output, "块数量: {}", store.block_info().len())?;
        writeln!(output, "待定修改: {}", store.changes_key_set().len())?;
        writeln!(output)?;
        Ok(())
    }

    /// 写入块信息（按偏移排序）
    fn write_blocks_info(output: &mut String, store: &OverlayStore) -> std::fmt::Result {
        let mut blocks: Vec<Block> = store
            .block_info()
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        blocks.sort_by_key(Block::start);

        writeln!(output, "=== 块结构 ({}) ===", blocks.len())?;
        for block in &blocks {
            Self::dump_block(block, store, output)?;
        }
        writeln!(output)?;
        Ok(())
    }

    fn dump_block(block: &Block, store: &OverlayStore, output: &mut String) -> std::fmt::Result {
        writeln!(
            output,
            "块 0x{:08X} (大小: {} bytes, 变量: {})",
            block.start(),
            block.size(),
            block.variable_count()
        )?;
        for variable in block.iter_variables() {
            Self::dump_variable(variable, store, output, "")?;
        }
        for variable in block.staging().values() {
            Self::dump_variable(variable, store, output, " [暂存]")?;
        }
        Ok(())
    }

    fn dump_variable(
        variable: &VariableInfo,
        store: &OverlayStore,
        output: &mut String,
        marker: &str,
    ) -> std::fmt::Result {
        let edited = store.has_change(variable);
        // 解码失败时回退到解析期的值
        let value = store
            .read_value(variable)
            .map(|v| render_value(&v, variable.variable_type()))
            .unwrap_or_else(|_| variable.value_text());

        writeln!(
            output,
            "  0x{:08X} {} {}: {}{}{}",
            variable.key_offset(),
            variable.variable_type(),
            variable.name(),
            value,
            if edited { " *" } else { "" },
            marker
        )
    }

    /// 写入待定覆盖层条目
    fn write_changes_info(output: &mut String, store: &OverlayStore) -> std::fmt::Result {
        let keys = store.changes_key_set();
        writeln!(output, "=== 待定覆盖层 ({}) ===", keys.len())?;
        for offset in keys {
            let replacement = store.get_bytes(offset).map(|b| b.len()).unwrap_or(0);
            let original = store.original_length(offset).unwrap_or(0);
            writeln!(
                output,
                "  0x{:08X}: {} -> {} bytes",
                offset, original, replacement
            )?;
        }
        Ok(())
    }
}
