use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use batchload::{BatchFunction, BatchOutput, Loader, LoaderConfig};

// Empty functor that implements the BatchFunction trait. For this example, it
// trivially loads values from some HashMap.
struct MyBatchFn;

#[async_trait]
impl BatchFunction<i64, String> for MyBatchFn {
    type Context = HashMap<i64, String>;
    type Error = String;

    async fn load(keys: &[i64], context: &Self::Context) -> BatchOutput<String, String> {
        println!("fetching {:?}", keys);
        BatchOutput::from_values(keys.iter().map(|k| context.get(k).cloned()))
    }
}

#[tokio::main]
async fn main() {
    let mut context = HashMap::new();
    context.insert(2001, "a space odyssey".to_owned());
    context.insert(7, "samurai".to_owned());
    context.insert(12, "angry men".to_owned());

    let config =
        LoaderConfig::default().with_wait(Duration::from_millis(2)).with_max_batch_size(16);
    let loader = Loader::with_config(MyBatchFn {}, context, config);

    assert_eq!(loader.load(7).await.unwrap().as_deref(), Some("samurai"));
    assert_eq!(loader.load(15).await.unwrap(), None);

    // Both thunks are attached before either is awaited, so they share one fetch.
    let (first, second) = tokio::join!(loader.load_thunk(12), loader.load_thunk(2010));
    assert_eq!(first.unwrap().as_deref(), Some("angry men"));
    assert_eq!(second.unwrap(), None);

    assert_eq!(
        loader
            .load_all(vec![12, 2010, 2001])
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect::<Vec<_>>(),
        vec![Some("angry men".to_owned()), None, Some("a space odyssey".to_owned())]
    );
}
