/// 随页面一起发布的静态文件（相对 output/static/）
pub const STATIC_FILES: [(&str, &str); 2] = [
    ("style.css", include_str!("../../assets/style.css")),
    ("filter.js", include_str!("../../assets/filter.js")),
];
