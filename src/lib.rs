// 该文件是 Lieying （猎影） 项目的一部分。
// src/lib.rs - 库主文件
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

pub mod args;
pub mod frame;
pub mod input;
pub mod motion;
pub mod output;
pub mod task;
pub mod tracker;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// 取出 URL 中的文件路径，并还原百分号编码（例如路径中的空格）
pub(crate) fn url_file_path(url: &url::Url) -> std::path::PathBuf {
  let path = url.path();
  match urlencoding::decode(path) {
    Ok(decoded) => std::path::PathBuf::from(decoded.into_owned()),
    Err(_) => std::path::PathBuf::from(path),
  }
}

/// 判断 URL 查询参数中是否出现某个开关（例如 `?loop`、`?always`）
pub(crate) fn url_has_flag(url: &url::Url, flag: &str) -> bool {
  url.query_pairs().any(|(k, _)| k == flag)
}

/// 读取 URL 查询参数中的某个值
pub(crate) fn url_query_value(url: &url::Url, key: &str) -> Option<String> {
  url
    .query_pairs()
    .find(|(k, _)| k == key)
    .map(|(_, v)| v.into_owned())
}

#[cfg(test)]
mod tests {
  use super::*;
  use url::Url;

  #[test]
  fn decodes_percent_encoded_paths() {
    let url = Url::parse("image:///tmp/my%20frames/a.png").unwrap();
    assert_eq!(
      url_file_path(&url),
      std::path::PathBuf::from("/tmp/my frames/a.png")
    );
  }

  #[test]
  fn reads_query_flags_and_values() {
    let url = Url::parse("frames:///tmp/seq?fps=12.5&loop").unwrap();
    assert!(url_has_flag(&url, "loop"));
    assert!(!url_has_flag(&url, "hold"));
    assert_eq!(url_query_value(&url, "fps").as_deref(), Some("12.5"));
    assert_eq!(url_query_value(&url, "missing"), None);
  }
}
