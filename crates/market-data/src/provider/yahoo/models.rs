//! Yahoo Finance quoteSummary response models.

use serde::Deserialize;

/// Main response wrapper for quoteSummary API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooQuoteSummaryResponse {
    pub quote_summary: YahooQuoteSummary,
}

/// Quote summary container
#[derive(Debug, Deserialize)]
pub struct YahooQuoteSummary {
    #[serde(default)]
    pub result: Vec<YahooQuoteSummaryResult>,
}

/// Individual result from quoteSummary API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooQuoteSummaryResult {
    pub price: Option<YahooPriceData>,
    pub summary_profile: Option<YahooSummaryProfile>,
}

/// Price data from quoteSummary API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooPriceData {
    pub currency: Option<String>,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub quote_type: Option<String>,
    pub regular_market_price: Option<YahooPriceDetail>,
    pub regular_market_time: Option<i64>,
}

/// Price detail with raw and formatted values
#[derive(Debug, Deserialize, Clone)]
pub struct YahooPriceDetail {
    pub raw: Option<f64>,
}

/// Summary profile data (company info)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooSummaryProfile {
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub country: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_price_detail_null() {
        let json = r#"{"raw": null, "fmt": null}"#;
        let detail: YahooPriceDetail = serde_json::from_str(json).unwrap();
        assert_eq!(detail.raw, None);
    }

    #[test]
    fn test_deserialize_quote_summary() {
        let json = r#"{
            "quoteSummary": {
                "result": [{
                    "price": {
                        "currency": "USD",
                        "longName": "Apple Inc.",
                        "quoteType": "EQUITY",
                        "regularMarketPrice": {"raw": 189.5, "fmt": "189.50"},
                        "regularMarketTime": 1710532800
                    },
                    "summaryProfile": {
                        "sector": "Technology",
                        "industry": "Consumer Electronics",
                        "country": "United States",
                        "fullTimeEmployees": 164000
                    }
                }],
                "error": null
            }
        }"#;
        let response: YahooQuoteSummaryResponse = serde_json::from_str(json).unwrap();
        let result = &response.quote_summary.result[0];
        let price = result.price.as_ref().unwrap();
        assert_eq!(price.long_name.as_deref(), Some("Apple Inc."));
        assert_eq!(
            price.regular_market_price.as_ref().and_then(|p| p.raw),
            Some(189.5)
        );
        let profile = result.summary_profile.as_ref().unwrap();
        assert_eq!(profile.sector.as_deref(), Some("Technology"));
    }

    #[test]
    fn test_deserialize_missing_result() {
        let json = r#"{"quoteSummary": {"result": null, "error": {"code": "Not Found"}}}"#;
        let parsed: Result<YahooQuoteSummaryResponse, _> = serde_json::from_str(json);
        // `null` is not a sequence; Yahoo's not-found payload surfaces as a parse error
        assert!(parsed.is_err());
    }
}
