// 分页参数

pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;

/// 分页参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationParams {
    pub page: u32,
    pub limit: u32,
}

impl PaginationParams {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT), // 限制在1-100之间
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_params() {
        let params = PaginationParams::new(Some(2), Some(10));
        assert_eq!(params.page, 2);
        assert_eq!(params.limit, 10);
    }

    #[test]
    fn test_pagination_defaults_and_clamping() {
        assert_eq!(
            PaginationParams::new(None, None),
            PaginationParams { page: 1, limit: DEFAULT_LIMIT }
        );
        let params = PaginationParams::new(Some(0), Some(1000));
        assert_eq!(params.page, 1);
        assert_eq!(params.limit, MAX_LIMIT);
        assert_eq!(PaginationParams::new(None, Some(0)).limit, 1);
    }
}
