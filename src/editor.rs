/// 编辑器层模块
///
/// 该模块提供存档文档的覆盖层编辑接口。
/// 遵循"修改-保存分离"原则：原始数据从不修改，所有编辑都记录为
/// 偏移量 -> 替换字节 的稀疏覆盖层，由外部写入器在保存时拼接。
///
/// # 架构设计
///
/// - **config**: 覆盖层需要知道的特殊变量名
/// - **overlay**: 覆盖层存储，读写/插入/删除操作
/// - **platform**: WINDOWS 与 MOBILE 编码之间的平台转换
///
/// # 使用示例
///
/// ```rust,ignore
/// use save_overlay::{DocumentIndex, OverlayStore, Platform};
///
/// let index = DocumentIndex::from_json(&json)?;
/// let store = OverlayStore::new();
/// store.load(index)?;
///
/// store.set_int("modifierPoints", 121)?;
/// store.convert_to(Platform::Mobile, "0A1B2C")?;
///
/// for offset in store.changes_key_set() {
///     // 外部写入器：用 get_bytes(offset) 替换原始数据中 offset 处的
///     // values_length_index()[offset] 个字节
/// }
/// ```
pub mod config;
pub mod overlay;
mod platform;

// === 导出公共接口 ===
pub use config::OverlayConfig;
pub use overlay::OverlayStore;
