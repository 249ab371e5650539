// ==========================================
// 国际化 (i18n) 模块
// ==========================================
// 使用 rust-i18n 库
// 支持英文（默认）和中文
// ==========================================
// 注意: rust_i18n::i18n! 宏已在 lib.rs 中初始化
// ==========================================

/// 界面语言环境变量
pub const LOCALE_ENV: &str = "TET_BLOOM_LANG";

/// 按环境变量设置语言，未设置或不支持时保持默认（en）
pub fn init_from_env() {
    if let Ok(locale) = std::env::var(LOCALE_ENV) {
        let locale = locale.trim();
        if is_supported(locale) {
            set_locale(locale);
        } else {
            tracing::warn!(locale = %locale, "不支持的语言，使用默认语言");
        }
    }
}

/// 获取当前语言
pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// 设置语言
///
/// # 参数
/// - locale: 语言代码（"en" 或 "zh-CN"）
pub fn set_locale(locale: &str) {
    rust_i18n::set_locale(locale);
}

/// 是否为已提供翻译的语言
pub fn is_supported(locale: &str) -> bool {
    rust_i18n::available_locales!().iter().any(|l| *l == locale)
}

/// 翻译消息（无参数）
///
/// # 示例
/// ```no_run
/// use tet_bloom_roster::i18n::t;
/// let msg = t("resolution.invalid_email");
/// ```
pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

/// 按指定语言翻译（不改变全局语言）
pub fn t_in(key: &str, locale: &str) -> String {
    rust_i18n::t!(key, locale = locale).to_string()
}

/// 翻译消息（带参数）
///
/// # 示例
/// ```no_run
/// use tet_bloom_roster::i18n::t_with_args;
/// let msg = t_with_args("cli.import_summary", &[("success", "3"), ("total", "5")]);
/// ```
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    let mut result = rust_i18n::t!(key).to_string();
    for (k, v) in args {
        let placeholder = format!("%{{{}}}", k);
        result = result.replace(&placeholder, v);
    }
    result
}
