use axum::body::Bytes;
use database::DbError;
use futures_util::Stream;
use serde::Serialize;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Frames a fallible stream of serializable rows as one JSON array body.
///
/// Array punctuation rides on the row chunks (`[row`, `,row`, ..., `]`), so
/// each element is encoded and put on the wire as its row arrives and at most
/// one encoded row exists at a time. An inner error ends the body
/// immediately: the transfer aborts rather than closing out a
/// truncated-but-well-formed array.
pub struct JsonArrayBody<S> {
    rows: S,
    opened: bool,
    done: bool,
}

impl<S> JsonArrayBody<S> {
    pub fn new(rows: S) -> Self {
        Self {
            rows,
            opened: false,
            done: false,
        }
    }
}

impl<S, T> Stream for JsonArrayBody<S>
where
    S: Stream<Item = Result<T, DbError>> + Unpin,
    T: Serialize,
{
    type Item = Result<Bytes, DbError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        match Pin::new(&mut this.rows).poll_next(cx) {
            Poll::Ready(Some(Ok(row))) => {
                let mut chunk = if this.opened {
                    vec![b',']
                } else {
                    this.opened = true;
                    vec![b'[']
                };
                match serde_json::to_vec(&row) {
                    Ok(encoded) => {
                        chunk.extend_from_slice(&encoded);
                        Poll::Ready(Some(Ok(chunk.into())))
                    }
                    Err(error) => {
                        this.done = true;
                        Poll::Ready(Some(Err(DbError::Json(error))))
                    }
                }
            }
            Poll::Ready(Some(Err(error))) => {
                this.done = true;
                Poll::Ready(Some(Err(error)))
            }
            Poll::Ready(None) => {
                this.done = true;
                let tail: &'static [u8] = if this.opened { b"]" } else { b"[]" };
                Poll::Ready(Some(Ok(Bytes::from_static(tail))))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{stream, StreamExt};
    use serde_json::{json, Value};

    /// Drains the body, concatenating chunks until the stream ends or errors.
    async fn drain<S>(body: &mut JsonArrayBody<S>) -> (String, Option<DbError>)
    where
        S: Stream<Item = Result<Value, DbError>> + Unpin,
    {
        let mut text = String::new();
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => text.push_str(std::str::from_utf8(&bytes).unwrap()),
                Err(error) => return (text, Some(error)),
            }
        }
        (text, None)
    }

    #[tokio::test]
    async fn empty_stream_renders_an_empty_array() {
        let mut body = JsonArrayBody::new(stream::iter(Vec::<Result<Value, DbError>>::new()));
        let (text, error) = drain(&mut body).await;
        assert!(error.is_none());
        assert_eq!(text, "[]");
        // The stream is fused after the closing bracket.
        assert!(body.next().await.is_none());
    }

    #[tokio::test]
    async fn rows_become_a_valid_json_array() {
        let rows = vec![
            Ok(json!({"infoId": 1, "firstName": "Ana"})),
            Ok(json!({"infoId": 2, "firstName": "Bruno"})),
        ];
        let mut body = JsonArrayBody::new(stream::iter(rows));
        let (text, error) = drain(&mut body).await;
        assert!(error.is_none());

        let parsed: Value = serde_json::from_str(&text).unwrap();
        let items = parsed.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["infoId"], json!(1));
        assert_eq!(items[1]["firstName"], json!("Bruno"));
    }

    #[tokio::test]
    async fn inner_error_aborts_the_body_mid_array() {
        let rows: Vec<Result<Value, DbError>> = vec![
            Ok(json!({"infoId": 1})),
            Err(DbError::Cancelled),
        ];
        let mut body = JsonArrayBody::new(stream::iter(rows));
        let (text, error) = drain(&mut body).await;

        // One element made it out, and the array was never closed: the
        // consumer sees a broken transfer, not a silently shortened result.
        assert_eq!(text, "[{\"infoId\":1}");
        assert!(matches!(error, Some(DbError::Cancelled)));
        assert!(body.next().await.is_none());
    }
}
