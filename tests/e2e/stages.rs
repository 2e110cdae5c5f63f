use shaderlab_optimizer::RewriteOptions;

use super::{count_of, given_rewrite};
use crate::common::{self, given};

const CUTOFF: &str = r#"_Cutoff ("Cutoff", Float) = 0.5"#;

#[test]
fn test_rewrite_when_pass_has_geometry_stage_should_carry_packed_id_through_it() {
    let program = r#"
            #pragma geometry geom

            float _Cutoff;

            struct v2f
            {
                float4 pos : SV_POSITION;
            };

            v2f vert (float4 vertex : POSITION)
            {
                v2f o;
                o.pos = vertex;
                return o;
            }

            [maxvertexcount(3)]
            void geom (triangle v2f input[3], inout TriangleStream<v2f> stream)
            {
                for (int j = 0; j < 3; j++) stream.Append(input[j]);
            }

            float4 frag (v2f i) : SV_Target
            {
                return 1;
            }
"#;
    let resolver = given::program_resolver(CUTOFF, program);

    let optimized = given_rewrite(
        &resolver,
        RewriteOptions::new().array_property("_Cutoff", [0.5f32, 0.9]),
    )
    .expect("rewrite");
    let main = optimized.main_file();

    assert_eq!(count_of(&optimized, "struct OptimizerVertexOutput"), 1);
    assert_eq!(count_of(&optimized, "struct OptimizerGeometryOutput"), 1);
    assert!(common::has_line(
        main,
        "OptimizerVertexOutput vert (float4 optimizerPackedUV : TEXCOORD7, float4 vertex : POSITION)"
    ));
    assert!(common::has_line(
        main,
        "void geom (triangle OptimizerVertexOutput optimizerGeometryInput[3], inout TriangleStream<OptimizerGeometryOutput> stream)"
    ));
    assert!(common::has_line(main, "v2f input[3];"));
    assert!(common::has_line(
        main,
        "for (uint optimizerIndex = 0; optimizerIndex < 3; optimizerIndex++) input[optimizerIndex] = optimizerGeometryInput[optimizerIndex].payload;"
    ));
    assert!(common::has_line(
        main,
        "optimizerPackedID = optimizerGeometryInput[0].optimizerPackedID;"
    ));
    assert!(common::has_line(
        main,
        "for (int j = 0; j < 3; j++) stream.Append(optimizerWrapGeometryOutput(input[j], optimizerPackedID));"
    ));
    assert!(common::has_line(
        main,
        "float4 frag (OptimizerGeometryOutput optimizerInput) : SV_Target"
    ));
    assert_eq!(count_of(&optimized, "_Cutoff = materialID == 1 ? 0.9 : 0.5;"), 3);
}

#[test]
fn test_rewrite_when_vertex_stage_is_void_should_pass_packed_id_as_out_parameter() {
    let program = r#"
            void vert (float4 vertex : POSITION, out float4 pos : SV_POSITION)
            {
                pos = vertex;
            }

            float4 frag (float4 pos : SV_POSITION) : SV_Target
            {
                return 1;
            }
"#;
    let resolver = given::program_resolver(CUTOFF, program);

    let optimized = given_rewrite(
        &resolver,
        RewriteOptions::new()
            .array_property("_Cutoff", [0.5f32, 0.9])
            .merged_meshes(0..2),
    )
    .expect("rewrite");
    let main = optimized.main_file();

    assert!(common::has_line(
        main,
        "void vert (float4 optimizerPackedUV : TEXCOORD7, float4 vertex : POSITION, out float4 pos : SV_POSITION, out nointerpolation uint optimizerPackedIDOut : OPTIMIZER_PACKED_ID)"
    ));
    assert!(common::has_line(main, "optimizerPackedIDOut = optimizerPackedID;"));
    assert!(common::has_line(main, "pos = (float4)0;"));
    assert!(common::has_line(main, "return;"));
    assert!(common::has_line(
        main,
        "float4 frag (float4 pos : SV_POSITION, nointerpolation uint optimizerPackedIDIn : OPTIMIZER_PACKED_ID) : SV_Target"
    ));
    assert!(common::has_line(main, "optimizerPackedID = optimizerPackedIDIn;"));
    assert!(!common::has_line_containing(main, "OptimizerVertexOutput"));
}

#[test]
fn test_rewrite_when_only_meshes_are_merged_should_leave_geometry_stage_untouched() {
    let program = r#"
            #pragma geometry geom

            struct v2f
            {
                float4 pos : SV_POSITION;
            };

            v2f vert (float4 vertex : POSITION)
            {
                v2f o;
                o.pos = vertex;
                return o;
            }

            [maxvertexcount(3)]
            void geom (triangle v2f input[3], inout TriangleStream<v2f> stream)
            {
                for (int j = 0; j < 3; j++) stream.Append(input[j]);
            }

            float4 frag (v2f i) : SV_Target
            {
                return 1;
            }
"#;
    let resolver = given::program_resolver("", program);

    let optimized = given_rewrite(&resolver, RewriteOptions::new().merged_meshes(0..2)).expect("rewrite");
    let main = optimized.main_file();

    assert!(common::has_line(
        main,
        "void geom (triangle v2f input[3], inout TriangleStream<v2f> stream)"
    ));
    assert!(common::has_line(
        main,
        "for (int j = 0; j < 3; j++) stream.Append(input[j]);"
    ));
    assert!(common::has_line(main, "float4 frag (v2f i) : SV_Target"));
    assert!(common::has_line(main, "return (v2f)0;"));
}
