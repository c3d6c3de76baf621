//! Engine query construction
//!
//! Builds the JSON body of an Elasticsearch `_search` request.

use serde_json::{json, Map, Value};

use super::types::{PageState, SearchParams};

/// Build the request body for `page` (1-based) of `params`.
///
/// Blank text without date bounds becomes `match_all`. Otherwise a `bool`
/// query carries a best-fields `multi_match` when there is text and an
/// inclusive `range` filter on `date` when either bound is set. Results are
/// ordered by score, then by date, both descending.
pub fn build_query(params: &SearchParams, page: u64, page_size: u64) -> Value {
    let from = PageState::new(page_size).offset(page);

    json!({
        "query": query_clause(params),
        "size": page_size,
        "from": from,
        "sort": [
            { "_score": { "order": "desc" } },
            { "date": { "order": "desc" } }
        ]
    })
}

fn query_clause(params: &SearchParams) -> Value {
    if params.is_match_all() {
        return json!({ "match_all": {} });
    }

    let mut bool_query = Map::new();

    let mut must = Vec::new();
    if params.has_text() {
        must.push(json!({
            "multi_match": {
                "query": params.search_text,
                "fields": params.search_fields,
                "operator": params.operator.as_str(),
                "type": "best_fields"
            }
        }));
    }
    bool_query.insert("must".to_string(), Value::Array(must));

    let mut range = Map::new();
    if let Some(from) = params.date_from() {
        range.insert("gte".to_string(), json!(from));
    }
    if let Some(to) = params.date_to() {
        range.insert("lte".to_string(), json!(to));
    }
    if !range.is_empty() {
        bool_query.insert(
            "filter".to_string(),
            json!([{ "range": { "date": range } }]),
        );
    }

    json!({ "bool": bool_query })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::Operator;

    #[test]
    fn test_empty_params_match_all() {
        let params = SearchParams::new("")
            .with_date_from(Some(String::new()))
            .with_date_to(Some(String::new()));
        let body = build_query(&params, 1, 50);

        assert_eq!(body["query"], json!({ "match_all": {} }));
        assert!(body["query"].get("multi_match").is_none());
        assert!(body["query"].get("bool").is_none());
    }

    #[test]
    fn test_text_query_uses_best_fields() {
        let params = SearchParams::new("quarterly report")
            .with_fields(["subject", "sender"])
            .with_operator(Operator::And);
        let body = build_query(&params, 1, 50);

        let multi_match = &body["query"]["bool"]["must"][0]["multi_match"];
        assert_eq!(multi_match["query"], "quarterly report");
        assert_eq!(multi_match["fields"], json!(["subject", "sender"]));
        assert_eq!(multi_match["operator"], "and");
        assert_eq!(multi_match["type"], "best_fields");
        assert!(body["query"]["bool"].get("filter").is_none());
    }

    #[test]
    fn test_date_only_query_filters_without_text() {
        let params = SearchParams::new("  ").with_date_from(Some("2024-01-01".to_string()));
        let body = build_query(&params, 1, 50);

        assert_eq!(body["query"]["bool"]["must"], json!([]));
        assert_eq!(
            body["query"]["bool"]["filter"],
            json!([{ "range": { "date": { "gte": "2024-01-01" } } }])
        );
    }

    #[test]
    fn test_text_and_both_bounds() {
        let params = SearchParams::new("contract")
            .with_date_from(Some("2024-01-01".to_string()))
            .with_date_to(Some("2024-03-31".to_string()));
        let body = build_query(&params, 1, 50);

        assert_eq!(body["query"]["bool"]["must"].as_array().unwrap().len(), 1);
        assert_eq!(
            body["query"]["bool"]["filter"][0]["range"]["date"],
            json!({ "gte": "2024-01-01", "lte": "2024-03-31" })
        );
    }

    #[test]
    fn test_sort_and_paging() {
        let body = build_query(&SearchParams::new("x"), 3, 50);

        assert_eq!(body["size"], 50);
        assert_eq!(body["from"], 100);
        assert_eq!(
            body["sort"],
            json!([
                { "_score": { "order": "desc" } },
                { "date": { "order": "desc" } }
            ])
        );

        let body = build_query(&SearchParams::new("x"), 0, 50);
        assert_eq!(body["from"], 0);
    }
}
