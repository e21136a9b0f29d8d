use thiserror::Error;

/// 外部API（LLM・音声合成）呼び出しのエラー
#[derive(Debug, Error)]
pub enum ApiError {
    /// 接続失敗・タイムアウトなどのネットワークエラー
    #[error("ネットワークエラー: {0}")]
    Network(String),

    /// 2xx 以外のHTTPステータス
    #[error("HTTPエラー: {status} - {body}")]
    Status { status: u16, body: String },

    /// 存在しない音声ID
    #[error("不正な音声ID: {voice_id}")]
    InvalidVoice { voice_id: String },

    /// レスポンスの形式が想定外
    #[error("レスポンス形式エラー: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// 再試行で回復する見込みがあるか
    ///
    /// ネットワークエラー、429、5xx のみが対象。
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::Status { status, .. } => *status == 429 || *status >= 500,
            ApiError::InvalidVoice { .. } | ApiError::InvalidResponse(_) => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            ApiError::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// 音声の読み書きができない場合のエラー
#[derive(Debug, Error)]
pub enum CodecError {
    /// このコーデックでは扱えない形式（結合処理そのものが利用不可）
    #[error("未対応の音声形式: {0}")]
    Unavailable(String),

    /// WAVの読み書き失敗
    #[error("WAV処理エラー: {0}")]
    Wav(#[from] hound::Error),

    /// ファイル入出力の失敗
    #[error("ファイル入出力エラー: {0}")]
    Io(#[from] std::io::Error),

    /// 形式の不一致など
    #[error("音声形式の不一致: {0}")]
    Mismatch(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ApiError::Network("connection refused".into()).is_transient());
        assert!(ApiError::Status { status: 429, body: String::new() }.is_transient());
        assert!(ApiError::Status { status: 503, body: String::new() }.is_transient());
        assert!(!ApiError::Status { status: 401, body: String::new() }.is_transient());
        assert!(!ApiError::InvalidVoice { voice_id: "x".into() }.is_transient());
        assert!(!ApiError::InvalidResponse("empty".into()).is_transient());
    }
}
